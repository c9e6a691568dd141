//! Passive (linear leak) membrane.

use crate::model::{ReactionModel, VariableKind};

const STATES: &[&str] = &["membrane/V"];
const PARAMETERS: &[&str] = &[
    "membrane/Cm",
    "membrane/i_Stim",
    "membrane/g_L",
    "membrane/E_L",
];
const INTERMEDIATES: &[&str] = &["membrane/i_L"];

/// `dV/dt = -(g_L (V - E_L) + i_Stim) / Cm`.
///
/// Linear, so a single node has the closed-form solution returned by
/// [`PassiveMembrane::analytic`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassiveMembrane {
    /// Initial voltage.
    pub v0: f64,
    /// Default capacitance.
    pub cm: f64,
    /// Default leak conductance.
    pub g_l: f64,
    /// Default leak reversal potential.
    pub e_l: f64,
}

impl Default for PassiveMembrane {
    fn default() -> Self {
        Self {
            v0: 0.0,
            cm: 1.0,
            g_l: 1.0,
            e_l: 0.0,
        }
    }
}

impl PassiveMembrane {
    /// Exact voltage after time `t` from `v0` under constant parameters.
    pub fn analytic(&self, t: f64, v0: f64, cm: f64, i_stim: f64) -> f64 {
        let v_inf = self.e_l - i_stim / self.g_l;
        v_inf + (v0 - v_inf) * (-self.g_l * t / cm).exp()
    }
}

impl ReactionModel for PassiveMembrane {
    fn name(&self) -> &str {
        "passive_membrane"
    }

    fn variables(&self, kind: VariableKind) -> &[&str] {
        match kind {
            VariableKind::State => STATES,
            VariableKind::Parameter => PARAMETERS,
            VariableKind::Intermediate => INTERMEDIATES,
        }
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.v0]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![self.cm, 0.0, self.g_l, self.e_l]
    }

    fn evaluate(
        &self,
        _t: f64,
        state: &[f64],
        params: &[f64],
        rates: &mut [f64],
        intermediates: &mut [f64],
    ) {
        let i_l = params[2] * (state[0] - params[3]);
        rates[0] = -(i_l + params[1]) / params[0];
        intermediates[0] = i_l;
    }
}
