//! Field ↔ reaction variable coupling.
//!
//! A [`FieldCoupler`] holds a fixed set of maps between field slots and
//! reaction variables, resolved once when built. Each push or pull is one
//! pass over the owned nodes; every slot is checked before anything is
//! copied, so a failing call leaves both sides untouched.

use cardion_core::{ConfigError, FieldRef, FieldWriter, ParameterSet};
use cardion_field::FieldStore;
use cardion_reaction::{Environment, ReactionState, ResolvedVariable};
use indexmap::IndexMap;

/// Copies values between field slots and reaction variables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldCoupler {
    push: Vec<(FieldRef, ResolvedVariable)>,
    pull: Vec<(ResolvedVariable, FieldRef)>,
}

impl FieldCoupler {
    /// Start declaring maps.
    pub fn builder<'a>(env: &'a Environment, store: &'a FieldStore) -> FieldCouplerBuilder<'a> {
        FieldCouplerBuilder {
            env,
            store,
            push: IndexMap::new(),
            pull: IndexMap::new(),
        }
    }

    /// Field to reaction maps, in declaration order.
    pub fn push_maps(&self) -> &[(FieldRef, ResolvedVariable)] {
        &self.push
    }

    /// Reaction to field maps, in declaration order.
    pub fn pull_maps(&self) -> &[(ResolvedVariable, FieldRef)] {
        &self.pull
    }

    /// Copy every push source slot into its reaction variable, for every
    /// owned node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownField`] if a slot is missing from `store`,
    /// [`ConfigError::FieldLengthMismatch`] if the store spans fewer nodes
    /// than `state`.
    pub fn push_to_reaction(
        &self,
        store: &FieldStore,
        state: &mut ReactionState,
    ) -> Result<(), ConfigError> {
        let mut sources = Vec::with_capacity(self.push.len());
        for &(slot, _) in &self.push {
            let values = store.get(slot)?;
            check_span(slot, values.len(), state.node_count())?;
            sources.push(values);
        }
        for (values, &(_, var)) in sources.into_iter().zip(&self.push) {
            state.set_all(var, values)?;
        }
        Ok(())
    }

    /// Copy every pulled reaction variable into its field slot, for every
    /// owned node. Halo entries are not touched.
    ///
    /// # Errors
    ///
    /// As [`push_to_reaction`](Self::push_to_reaction).
    pub fn pull_from_reaction(
        &self,
        state: &ReactionState,
        store: &mut FieldStore,
    ) -> Result<(), ConfigError> {
        for &(_, slot) in &self.pull {
            check_span(slot, store.get(slot)?.len(), state.node_count())?;
        }
        for &(var, slot) in &self.pull {
            let out = store.write(slot).ok_or_else(|| ConfigError::UnknownField {
                name: slot.to_string(),
            })?;
            state.get_all(var, out)?;
        }
        Ok(())
    }
}

fn check_span(slot: FieldRef, len: usize, owned: usize) -> Result<(), ConfigError> {
    if len < owned {
        return Err(ConfigError::FieldLengthMismatch {
            name: slot.to_string(),
            expected: owned,
            actual: len,
        });
    }
    Ok(())
}

/// Declares the maps of a [`FieldCoupler`]; names are resolved in
/// [`build()`](Self::build).
///
/// A reaction variable may be the target of at most one push and a slot the
/// target of at most one pull; a later declaration replaces an earlier one.
#[derive(Debug)]
pub struct FieldCouplerBuilder<'a> {
    env: &'a Environment,
    store: &'a FieldStore,
    push: IndexMap<String, (String, u32)>,
    pull: IndexMap<(String, u32), String>,
}

impl FieldCouplerBuilder<'_> {
    /// Copy component `component` of `field` into reaction variable
    /// `variable` before integration.
    pub fn push(mut self, field: &str, component: u32, variable: &str) -> Self {
        self.push
            .insert(variable.to_owned(), (field.to_owned(), component));
        self
    }

    /// Copy reaction variable `variable` into component `component` of
    /// `field` after integration.
    pub fn pull(mut self, variable: &str, field: &str, component: u32) -> Self {
        self.pull
            .insert((field.to_owned(), component), variable.to_owned());
        self
    }

    /// Resolve every name.
    ///
    /// # Errors
    ///
    /// Field resolution errors ([`ConfigError::UnknownField`],
    /// [`ConfigError::FieldComponentOutOfRange`]) and variable resolution
    /// errors ([`ConfigError::UnknownVariable`],
    /// [`ConfigError::VariableNotKnown`], [`ConfigError::VariableNotWanted`],
    /// or [`ConfigError::InvalidVariableUsage`] for a push into an
    /// intermediate).
    pub fn build(self) -> Result<FieldCoupler, ConfigError> {
        let push = self
            .push
            .iter()
            .map(|(var, (field, component))| {
                let slot = self.store.resolve(field, *component, ParameterSet::Values)?;
                Ok((slot, self.env.resolve_writable(var)?))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let pull = self
            .pull
            .iter()
            .map(|((field, component), var)| {
                let slot = self.store.resolve(field, *component, ParameterSet::Values)?;
                Ok((self.env.resolve(var)?, slot))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(FieldCoupler { push, pull })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardion_core::{FieldDef, FieldReader};
    use cardion_reaction::{EnvironmentBuilder, HodgkinHuxley1952};

    fn setup() -> (Environment, FieldStore) {
        let env = EnvironmentBuilder::new(HodgkinHuxley1952::new())
            .known("membrane/i_Stim")
            .known("membrane/Cm")
            .wanted("membrane/i_K")
            .build()
            .unwrap();
        let mut store = FieldStore::new(5);
        store.register(FieldDef::scalar("Vm").keep_previous()).unwrap();
        store.register(FieldDef::scalar("stimulus")).unwrap();
        store.register(FieldDef::with_components("materials", 4)).unwrap();
        store.register(FieldDef::scalar("i_K")).unwrap();
        (env, store)
    }

    #[test]
    fn push_and_pull_copy_owned_nodes() {
        let (env, mut store) = setup();
        let coupler = FieldCoupler::builder(&env, &store)
            .push("stimulus", 0, "membrane/i_Stim")
            .push("materials", 1, "membrane/Cm")
            .push("Vm", 0, "membrane/V")
            .pull("membrane/V", "Vm", 0)
            .pull("membrane/i_K", "i_K", 0)
            .build()
            .unwrap();
        assert_eq!(coupler.push_maps().len(), 3);

        let stim = store.resolve("stimulus", 0, ParameterSet::Values).unwrap();
        let cm = store.resolve("materials", 1, ParameterSet::Values).unwrap();
        let vm = store.resolve("Vm", 0, ParameterSet::Values).unwrap();
        store.initialise(stim, &[-1.0, -2.0, -3.0, -4.0, -5.0]).unwrap();
        store.fill(cm, 1.4).unwrap();
        store.fill(vm, -60.0).unwrap();

        // Three owned nodes, two halo nodes.
        let mut state = ReactionState::new(&env, 3);
        coupler.push_to_reaction(&store, &mut state).unwrap();
        let i_stim = env.resolve("membrane/i_Stim").unwrap();
        assert_eq!(state.get(2, i_stim), -3.0);
        assert_eq!(state.get(0, env.resolve("membrane/Cm").unwrap()), 1.4);

        state.set(1, env.resolve("membrane/V").unwrap(), 10.0).unwrap();
        store.fill(vm, 99.0).unwrap();
        coupler.pull_from_reaction(&state, &mut store).unwrap();
        assert_eq!(store.read(vm).unwrap(), &[-60.0, 10.0, -60.0, 99.0, 99.0]);
    }

    #[test]
    fn unflagged_or_unknown_names_fail_at_build() {
        let (env, store) = setup();
        let err = FieldCoupler::builder(&env, &store)
            .push("stimulus", 0, "sodium_channel/g_Na")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::VariableNotKnown { .. }));

        let err = FieldCoupler::builder(&env, &store)
            .pull("membrane/i_Na", "i_K", 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::VariableNotWanted { .. }));

        let err = FieldCoupler::builder(&env, &store)
            .push("i_K", 0, "membrane/i_K")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVariableUsage { .. }));

        let err = FieldCoupler::builder(&env, &store)
            .push("nope", 0, "membrane/V")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));

        let err = FieldCoupler::builder(&env, &store)
            .push("materials", 4, "membrane/Cm")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FieldComponentOutOfRange { .. }));
    }

    #[test]
    fn short_store_is_refused_without_partial_copy() {
        let (env, store) = setup();
        let coupler = FieldCoupler::builder(&env, &store)
            .push("Vm", 0, "membrane/V")
            .build()
            .unwrap();
        let mut state = ReactionState::new(&env, 6);
        let before = state.clone();
        assert!(matches!(
            coupler.push_to_reaction(&store, &mut state),
            Err(ConfigError::FieldLengthMismatch { .. })
        ));
        assert_eq!(state, before);
    }
}
