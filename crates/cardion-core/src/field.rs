//! Field definitions, parameter sets and the [`FieldRef`] slot address.

use crate::id::FieldId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which copy of a field's data a slot refers to.
///
/// Every field carries [`ParameterSet::Values`]. Fields that the diffusion
/// solver advances also carry [`ParameterSet::PreviousValues`], holding the
/// input of the most recent PDE step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSet {
    /// Current values.
    Values,
    /// Values at the start of the most recent PDE step.
    PreviousValues,
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values => write!(f, "values"),
            Self::PreviousValues => write!(f, "previous_values"),
        }
    }
}

/// Definition of a field registered in a field store.
///
/// A field is a named, per-node array of `components` scalars. Fields are
/// registered once at setup and live for the whole run.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Unique name used for lookup and logging (e.g. `"Vm"`).
    pub name: String,
    /// Number of scalar components per node.
    pub components: u32,
    /// Optional unit annotation (e.g. `"mV"`).
    pub units: Option<String>,
    /// Whether the field stores a [`ParameterSet::PreviousValues`] copy.
    pub keeps_previous: bool,
}

impl FieldDef {
    /// A single-component field with only current values.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: 1,
            units: None,
            keeps_previous: false,
        }
    }

    /// A field with `components` scalars per node.
    pub fn with_components(name: impl Into<String>, components: u32) -> Self {
        Self {
            name: name.into(),
            components,
            units: None,
            keeps_previous: false,
        }
    }

    /// Also allocate a [`ParameterSet::PreviousValues`] copy.
    pub fn keep_previous(mut self) -> Self {
        self.keeps_previous = true;
        self
    }

    /// Attach a unit annotation.
    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Whether this field stores the given parameter set.
    pub fn has_set(&self, set: ParameterSet) -> bool {
        match set {
            ParameterSet::Values => true,
            ParameterSet::PreviousValues => self.keeps_previous,
        }
    }

    /// Check structural invariants of the definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("field name must not be empty".into());
        }
        if self.components == 0 {
            return Err(format!("field '{}' must have at least one component", self.name));
        }
        Ok(())
    }
}

/// Address of one per-node scalar array: a field component in a parameter set.
///
/// Components are 0-based. A `FieldRef` is obtained from a store's
/// `resolve` method, which validates it once at setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The field.
    pub field: FieldId,
    /// Component index within the field.
    pub component: u32,
    /// Parameter set.
    pub set: ParameterSet,
}

impl FieldRef {
    /// Component `component` of `field` in the current values set.
    pub fn values(field: FieldId, component: u32) -> Self {
        Self {
            field,
            component,
            set: ParameterSet::Values,
        }
    }

    /// The same slot in another parameter set.
    pub fn in_set(self, set: ParameterSet) -> Self {
        Self { set, ..self }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}[{}] ({})", self.field, self.component, self.set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_set_always_present() {
        let def = FieldDef::scalar("Vm");
        assert!(def.has_set(ParameterSet::Values));
        assert!(!def.has_set(ParameterSet::PreviousValues));
        assert!(def.keep_previous().has_set(ParameterSet::PreviousValues));
    }

    #[test]
    fn validate_rejects_zero_components() {
        let def = FieldDef::with_components("materials", 0);
        assert!(def.validate().unwrap_err().contains("component"));
        assert!(FieldDef::scalar("").validate().is_err());
    }

    #[test]
    fn in_set_keeps_field_and_component() {
        let r = FieldRef::values(FieldId(3), 1).in_set(ParameterSet::PreviousValues);
        assert_eq!(r.field, FieldId(3));
        assert_eq!(r.component, 1);
        assert_eq!(r.set, ParameterSet::PreviousValues);
    }
}
