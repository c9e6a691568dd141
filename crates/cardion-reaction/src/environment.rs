//! Model environment: the model plus its known/wanted variable flags.

use crate::model::{ReactionModel, VariableKind};
use cardion_core::ConfigError;
use std::sync::Arc;

/// A variable name resolved once to its storage slot.
///
/// Obtained from [`Environment::resolve`]; the hot loop uses these handles
/// instead of names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedVariable {
    /// Index into the state vector.
    State(u32),
    /// Index into the parameter vector.
    Parameter(u32),
    /// An intermediate flagged wanted.
    Intermediate {
        /// Index into the model's intermediate vector.
        model_index: u32,
        /// Index into the per-node wanted buffer.
        slot: u32,
    },
}

impl ResolvedVariable {
    /// The kind of the resolved variable.
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::State(_) => VariableKind::State,
            Self::Parameter(_) => VariableKind::Parameter,
            Self::Intermediate { .. } => VariableKind::Intermediate,
        }
    }
}

/// A reaction model with its per-node variable flags.
///
/// Cheap to clone; the model itself is shared.
#[derive(Clone)]
pub struct Environment {
    model: Arc<dyn ReactionModel>,
    known: Vec<bool>,
    wanted: Vec<u32>,
    initial_state: Vec<f64>,
    default_parameters: Vec<f64>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("model", &self.model.name())
            .field("known", &self.known)
            .field("wanted", &self.wanted)
            .finish()
    }
}

impl Environment {
    /// The wrapped model.
    pub fn model(&self) -> &dyn ReactionModel {
        self.model.as_ref()
    }

    /// Number of state variables.
    pub fn state_count(&self) -> usize {
        self.initial_state.len()
    }

    /// Number of parameters.
    pub fn parameter_count(&self) -> usize {
        self.default_parameters.len()
    }

    /// Number of intermediates the model computes.
    pub fn intermediate_count(&self) -> usize {
        self.model.variables(VariableKind::Intermediate).len()
    }

    /// Model indices of wanted intermediates, in slot order.
    pub fn wanted(&self) -> &[u32] {
        &self.wanted
    }

    /// Initial state vector.
    pub fn initial_state(&self) -> &[f64] {
        &self.initial_state
    }

    /// Default parameter vector.
    pub fn default_parameters(&self) -> &[f64] {
        &self.default_parameters
    }

    /// Name of a resolved variable.
    pub fn name(&self, var: ResolvedVariable) -> &str {
        let (kind, index) = match var {
            ResolvedVariable::State(i) => (VariableKind::State, i),
            ResolvedVariable::Parameter(i) => (VariableKind::Parameter, i),
            ResolvedVariable::Intermediate { model_index, .. } => {
                (VariableKind::Intermediate, model_index)
            }
        };
        self.model
            .variables(kind)
            .get(index as usize)
            .copied()
            .unwrap_or("?")
    }

    /// Resolve a variable name for reading or writing.
    ///
    /// Parameters must be flagged known and intermediates wanted.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownVariable`], [`ConfigError::VariableNotKnown`] or
    /// [`ConfigError::VariableNotWanted`].
    pub fn resolve(&self, name: &str) -> Result<ResolvedVariable, ConfigError> {
        match locate(self.model.as_ref(), name)? {
            (VariableKind::State, i) => Ok(ResolvedVariable::State(i)),
            (VariableKind::Parameter, i) => {
                if self.known[i as usize] {
                    Ok(ResolvedVariable::Parameter(i))
                } else {
                    Err(ConfigError::VariableNotKnown { name: name.into() })
                }
            }
            (VariableKind::Intermediate, i) => self
                .wanted
                .iter()
                .position(|&w| w == i)
                .map(|slot| ResolvedVariable::Intermediate {
                    model_index: i,
                    slot: slot as u32,
                })
                .ok_or_else(|| ConfigError::VariableNotWanted { name: name.into() }),
        }
    }

    /// Resolve a variable that will be written per node.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve`], plus [`ConfigError::InvalidVariableUsage`] for
    /// intermediates, which are outputs only.
    pub fn resolve_writable(&self, name: &str) -> Result<ResolvedVariable, ConfigError> {
        let var = self.resolve(name)?;
        if var.kind() == VariableKind::Intermediate {
            return Err(ConfigError::InvalidVariableUsage {
                name: name.into(),
                usage: "a coupling target",
            });
        }
        Ok(var)
    }
}

fn locate(model: &dyn ReactionModel, name: &str) -> Result<(VariableKind, u32), ConfigError> {
    for kind in [
        VariableKind::State,
        VariableKind::Parameter,
        VariableKind::Intermediate,
    ] {
        if let Some(i) = model.variables(kind).iter().position(|&v| v == name) {
            return Ok((kind, i as u32));
        }
    }
    Err(ConfigError::UnknownVariable { name: name.into() })
}

/// Builder for an [`Environment`].
///
/// ```
/// use cardion_reaction::{EnvironmentBuilder, HodgkinHuxley1952};
///
/// let env = EnvironmentBuilder::new(HodgkinHuxley1952::new())
///     .known("membrane/i_Stim")
///     .known("membrane/Cm")
///     .wanted("membrane/i_K")
///     .build()
///     .unwrap();
/// assert!(env.resolve("membrane/i_K").is_ok());
/// assert!(env.resolve("membrane/i_Na").is_err());
/// ```
pub struct EnvironmentBuilder {
    model: Arc<dyn ReactionModel>,
    known: Vec<String>,
    wanted: Vec<String>,
}

impl EnvironmentBuilder {
    /// Start from a model.
    pub fn new(model: impl ReactionModel) -> Self {
        Self::from_shared(Arc::new(model))
    }

    /// Start from a shared model.
    pub fn from_shared(model: Arc<dyn ReactionModel>) -> Self {
        Self {
            model,
            known: Vec::new(),
            wanted: Vec::new(),
        }
    }

    /// Flag a parameter as set per node.
    pub fn known(mut self, name: impl Into<String>) -> Self {
        self.known.push(name.into());
        self
    }

    /// Flag an intermediate as read back per node.
    pub fn wanted(mut self, name: impl Into<String>) -> Self {
        self.wanted.push(name.into());
        self
    }

    /// Validate the flags and the model's declared shapes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownVariable`] for a flag on a missing name,
    /// [`ConfigError::InvalidVariableUsage`] for a flag on the wrong kind,
    /// [`ConfigError::InvalidParameter`] if the model declares no state or
    /// its initial vectors disagree with its variable lists.
    pub fn build(self) -> Result<Environment, ConfigError> {
        let model = self.model;
        let states = model.variables(VariableKind::State).len();
        let params = model.variables(VariableKind::Parameter).len();
        let initial_state = model.initial_state();
        let default_parameters = model.default_parameters();
        if states == 0 || initial_state.len() != states {
            return Err(ConfigError::InvalidParameter {
                name: format!("{}: state count", model.name()),
                value: initial_state.len() as f64,
            });
        }
        if default_parameters.len() != params {
            return Err(ConfigError::InvalidParameter {
                name: format!("{}: parameter count", model.name()),
                value: default_parameters.len() as f64,
            });
        }

        let mut known = vec![false; params];
        for name in &self.known {
            match locate(model.as_ref(), name)? {
                (VariableKind::Parameter, i) => known[i as usize] = true,
                _ => {
                    return Err(ConfigError::InvalidVariableUsage {
                        name: name.clone(),
                        usage: "a known parameter",
                    })
                }
            }
        }
        let mut wanted = Vec::new();
        for name in &self.wanted {
            match locate(model.as_ref(), name)? {
                (VariableKind::Intermediate, i) => {
                    if !wanted.contains(&i) {
                        wanted.push(i);
                    }
                }
                _ => {
                    return Err(ConfigError::InvalidVariableUsage {
                        name: name.clone(),
                        usage: "a wanted intermediate",
                    })
                }
            }
        }

        tracing::debug!(
            model = model.name(),
            states,
            params,
            known = self.known.len(),
            wanted = wanted.len(),
            "reaction environment built"
        );
        Ok(Environment {
            model,
            known,
            wanted,
            initial_state,
            default_parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HodgkinHuxley1952, PassiveMembrane};

    fn hh() -> Environment {
        EnvironmentBuilder::new(HodgkinHuxley1952::new())
            .known("membrane/i_Stim")
            .known("membrane/Cm")
            .wanted("membrane/i_K")
            .build()
            .unwrap()
    }

    #[test]
    fn resolves_each_kind() {
        let env = hh();
        assert_eq!(env.resolve("membrane/V").unwrap(), ResolvedVariable::State(0));
        assert!(matches!(
            env.resolve("membrane/Cm").unwrap(),
            ResolvedVariable::Parameter(_)
        ));
        assert!(matches!(
            env.resolve("membrane/i_K").unwrap(),
            ResolvedVariable::Intermediate { slot: 0, .. }
        ));
        assert_eq!(env.name(env.resolve("membrane/i_K").unwrap()), "membrane/i_K");
    }

    #[test]
    fn unflagged_variables_are_refused() {
        let env = hh();
        assert!(matches!(
            env.resolve("membrane/E_R"),
            Err(ConfigError::VariableNotKnown { .. })
        ));
        assert!(matches!(
            env.resolve("membrane/i_Na"),
            Err(ConfigError::VariableNotWanted { .. })
        ));
        assert!(matches!(
            env.resolve("membrane/nope"),
            Err(ConfigError::UnknownVariable { .. })
        ));
        assert!(matches!(
            env.resolve_writable("membrane/i_K"),
            Err(ConfigError::InvalidVariableUsage { .. })
        ));
    }

    #[test]
    fn flags_on_wrong_kind_are_refused() {
        let err = EnvironmentBuilder::new(PassiveMembrane::default())
            .known("membrane/V")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVariableUsage { .. }));

        let err = EnvironmentBuilder::new(PassiveMembrane::default())
            .wanted("membrane/missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariable { .. }));
    }
}
