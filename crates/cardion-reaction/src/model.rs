//! The [`ReactionModel`] trait.

use std::fmt;

/// Category of a model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Integrated state variable (e.g. membrane voltage, gating variables).
    State,
    /// Constant input, optionally overridden per node when flagged known.
    Parameter,
    /// Derived quantity computed alongside the rates (e.g. ionic currents).
    Intermediate,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => write!(f, "state"),
            Self::Parameter => write!(f, "parameter"),
            Self::Intermediate => write!(f, "intermediate"),
        }
    }
}

/// A cellular ionic-current ODE model: `state' = f(t, state, params)`.
///
/// # Contract
///
/// - `evaluate` MUST be deterministic and free of side effects; it is
///   called concurrently from many threads.
/// - Slice lengths passed to `evaluate` match the variable counts reported
///   by [`variables`](Self::variables).
/// - Variable names are unique across all kinds and conventionally of the
///   form `component/variable`.
///
/// # Examples
///
/// ```
/// use cardion_reaction::{ReactionModel, VariableKind};
///
/// /// dV/dt = -k V
/// struct Decay;
///
/// impl ReactionModel for Decay {
///     fn name(&self) -> &str { "decay" }
///     fn variables(&self, kind: VariableKind) -> &[&str] {
///         match kind {
///             VariableKind::State => &["cell/V"],
///             VariableKind::Parameter => &["cell/k"],
///             VariableKind::Intermediate => &[],
///         }
///     }
///     fn initial_state(&self) -> Vec<f64> { vec![1.0] }
///     fn default_parameters(&self) -> Vec<f64> { vec![2.0] }
///     fn evaluate(&self, _t: f64, s: &[f64], p: &[f64], rates: &mut [f64], _i: &mut [f64]) {
///         rates[0] = -p[0] * s[0];
///     }
/// }
///
/// let mut rates = [0.0];
/// Decay.evaluate(0.0, &[1.0], &[2.0], &mut rates, &mut []);
/// assert_eq!(rates[0], -2.0);
/// ```
pub trait ReactionModel: Send + Sync + 'static {
    /// Human-readable model name for logging.
    fn name(&self) -> &str;

    /// Names of the model's variables of one kind, in slot order.
    fn variables(&self, kind: VariableKind) -> &[&str];

    /// Initial value of every state variable.
    fn initial_state(&self) -> Vec<f64>;

    /// Default value of every parameter.
    fn default_parameters(&self) -> Vec<f64>;

    /// Compute state derivatives into `rates` and all intermediates into
    /// `intermediates`.
    fn evaluate(
        &self,
        t: f64,
        state: &[f64],
        params: &[f64],
        rates: &mut [f64],
        intermediates: &mut [f64],
    );
}
