//! Deterministic reaction models for testing.
//!
//! Both models expose the same variable names as the built-in membrane
//! models (`membrane/V`, `membrane/Cm`, `membrane/i_Stim`, `membrane/i_K`),
//! so the default coupling configuration works with them unchanged.

use cardion_reaction::{ReactionModel, VariableKind};

const STATES: &[&str] = &["membrane/V"];
const PARAMETERS: &[&str] = &["membrane/Cm", "membrane/i_Stim", "cell/rate"];
const INTERMEDIATES: &[&str] = &["membrane/i_K"];

fn variables(kind: VariableKind) -> &'static [&'static str] {
    match kind {
        VariableKind::State => STATES,
        VariableKind::Parameter => PARAMETERS,
        VariableKind::Intermediate => INTERMEDIATES,
    }
}

/// `dV/dt = rate - i_Stim / Cm`.
///
/// Every explicit scheme integrates this exactly, so after time `t` an
/// unstimulated node holds `v0 + rate * t` up to rounding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantRate {
    pub v0: f64,
    pub rate: f64,
}

impl ConstantRate {
    pub fn new(v0: f64, rate: f64) -> Self {
        Self { v0, rate }
    }
}

impl ReactionModel for ConstantRate {
    fn name(&self) -> &str {
        "constant_rate"
    }

    fn variables(&self, kind: VariableKind) -> &[&str] {
        variables(kind)
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.v0]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, 0.0, self.rate]
    }

    fn evaluate(&self, _t: f64, _s: &[f64], p: &[f64], rates: &mut [f64], inter: &mut [f64]) {
        rates[0] = p[2] - p[1] / p[0];
        inter[0] = p[1];
    }
}

/// Holds `V` constant until time `after`, then produces a NaN rate at every
/// node with a non-zero stimulus.
///
/// Used to check that a non-finite reaction state is reported with the
/// lowest failing node id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplodingModel {
    pub v0: f64,
    pub after: f64,
}

impl ExplodingModel {
    pub fn new(after: f64) -> Self {
        Self { v0: 0.0, after }
    }
}

impl ReactionModel for ExplodingModel {
    fn name(&self) -> &str {
        "exploding"
    }

    fn variables(&self, kind: VariableKind) -> &[&str] {
        variables(kind)
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.v0]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, 0.0, 0.0]
    }

    fn evaluate(&self, t: f64, _s: &[f64], p: &[f64], rates: &mut [f64], inter: &mut [f64]) {
        rates[0] = if p[1] != 0.0 && t >= self.after {
            f64::NAN
        } else {
            0.0
        };
        inter[0] = 0.0;
    }
}
