//! Hodgkin & Huxley (1952) squid giant axon model.
//!
//! Units are ms, mV, mS/cm^2 and uA/cm^2. Reversal potentials are offsets
//! from the resting potential `membrane/E_R`.

use crate::model::{ReactionModel, VariableKind};

const STATES: &[&str] = &[
    "membrane/V",
    "sodium_channel_m_gate/m",
    "sodium_channel_h_gate/h",
    "potassium_channel_n_gate/n",
];

const PARAMETERS: &[&str] = &[
    "membrane/Cm",
    "membrane/E_R",
    "membrane/i_Stim",
    "sodium_channel/g_Na",
    "potassium_channel/g_K",
    "leakage_current/g_L",
];

const INTERMEDIATES: &[&str] = &["membrane/i_Na", "membrane/i_K", "membrane/i_L"];

const V: usize = 0;
const M: usize = 1;
const H: usize = 2;
const N: usize = 3;

const CM: usize = 0;
const E_R: usize = 1;
const I_STIM: usize = 2;
const G_NA: usize = 3;
const G_K: usize = 4;
const G_L: usize = 5;

/// The Hodgkin-Huxley 1952 membrane model.
///
/// `dV/dt = -(i_Stim + i_Na + i_K + i_L) / Cm` with `m`, `h`, `n` gating.
#[derive(Clone, Copy, Debug, Default)]
pub struct HodgkinHuxley1952;

impl HodgkinHuxley1952 {
    /// The model with its published constants.
    pub fn new() -> Self {
        Self
    }
}

/// `x / (1 - exp(-x / 10))`, continuous through `x = 0` where it equals 10.
fn vtrap(x: f64) -> f64 {
    let denom = -(-x / 10.0).exp_m1();
    if denom.abs() < 1e-12 {
        10.0
    } else {
        x / denom
    }
}

impl ReactionModel for HodgkinHuxley1952 {
    fn name(&self) -> &str {
        "hodgkin_huxley_1952"
    }

    fn variables(&self, kind: VariableKind) -> &[&str] {
        match kind {
            VariableKind::State => STATES,
            VariableKind::Parameter => PARAMETERS,
            VariableKind::Intermediate => INTERMEDIATES,
        }
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![-75.0, 0.05, 0.6, 0.325]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, -75.0, 0.0, 120.0, 36.0, 0.3]
    }

    fn evaluate(
        &self,
        _t: f64,
        state: &[f64],
        params: &[f64],
        rates: &mut [f64],
        intermediates: &mut [f64],
    ) {
        let (v, m, h, n) = (state[V], state[M], state[H], state[N]);
        let e_r = params[E_R];
        let e_na = e_r + 115.0;
        let e_k = e_r - 12.0;
        let e_l = e_r + 10.613;

        let i_na = params[G_NA] * m.powi(3) * h * (v - e_na);
        let i_k = params[G_K] * n.powi(4) * (v - e_k);
        let i_l = params[G_L] * (v - e_l);

        let alpha_m = 0.1 * vtrap(v + 50.0);
        let beta_m = 4.0 * (-(v + 75.0) / 18.0).exp();
        let alpha_h = 0.07 * (-(v + 75.0) / 20.0).exp();
        let beta_h = 1.0 / ((-(v + 45.0) / 10.0).exp() + 1.0);
        let alpha_n = 0.01 * vtrap(v + 65.0);
        let beta_n = 0.125 * ((v + 75.0) / 80.0).exp();

        rates[V] = -(params[I_STIM] + i_na + i_k + i_l) / params[CM];
        rates[M] = alpha_m * (1.0 - m) - beta_m * m;
        rates[H] = alpha_h * (1.0 - h) - beta_h * h;
        rates[N] = alpha_n * (1.0 - n) - beta_n * n;

        intermediates[0] = i_na;
        intermediates[1] = i_k;
        intermediates[2] = i_l;
    }
}
