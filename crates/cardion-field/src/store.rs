//! Contiguous per-node field storage.

use cardion_core::{
    ConfigError, FieldDef, FieldId, FieldReader, FieldRef, FieldWriter, ParameterSet,
};
use indexmap::IndexMap;

#[derive(Clone, Debug)]
struct FieldEntry {
    def: FieldDef,
    version: u64,
}

/// Storage for all fields of one partition.
///
/// Every write through [`FieldWriter::write`] (or the helpers built on it)
/// increments the field's version, so consumers that cache derived data
/// (such as assembled matrices) can detect changes.
#[derive(Clone, Debug)]
pub struct FieldStore {
    node_count: usize,
    data: Vec<f64>,
    fields: IndexMap<String, FieldEntry>,
    /// Maps a slot to its offset within `data`; each slot is `node_count` long.
    slots: IndexMap<FieldRef, usize>,
}

impl FieldStore {
    /// An empty store over `node_count` local nodes.
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            data: Vec::new(),
            fields: IndexMap::new(),
            slots: IndexMap::new(),
        }
    }

    /// Register a field; its values start at zero.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidField`] for a malformed definition,
    /// [`ConfigError::DuplicateField`] if the name is taken.
    pub fn register(&mut self, def: FieldDef) -> Result<FieldId, ConfigError> {
        def.validate()
            .map_err(|reason| ConfigError::InvalidField { reason })?;
        if self.fields.contains_key(&def.name) {
            return Err(ConfigError::DuplicateField { name: def.name });
        }
        let id = FieldId(self.fields.len() as u32);
        for set in [ParameterSet::Values, ParameterSet::PreviousValues] {
            if !def.has_set(set) {
                continue;
            }
            for component in 0..def.components {
                let slot = FieldRef {
                    field: id,
                    component,
                    set,
                };
                self.slots.insert(slot, self.data.len());
                self.data.resize(self.data.len() + self.node_count, 0.0);
            }
        }
        tracing::trace!(field = %def.name, id = %id, components = def.components, "field registered");
        self.fields.insert(def.name.clone(), FieldEntry { def, version: 0 });
        Ok(id)
    }

    /// Look up a field id by name.
    pub fn id(&self, name: &str) -> Result<FieldId, ConfigError> {
        self.fields
            .get_index_of(name)
            .map(|i| FieldId(i as u32))
            .ok_or_else(|| ConfigError::UnknownField { name: name.into() })
    }

    /// Definition of a registered field.
    pub fn def(&self, field: FieldId) -> Option<&FieldDef> {
        self.fields.get_index(field.0 as usize).map(|(_, e)| &e.def)
    }

    /// Resolve a named slot once, checking component and parameter set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownField`], [`ConfigError::FieldComponentOutOfRange`]
    /// or [`ConfigError::MissingParameterSet`].
    pub fn resolve(
        &self,
        name: &str,
        component: u32,
        set: ParameterSet,
    ) -> Result<FieldRef, ConfigError> {
        let id = self.id(name)?;
        let def = &self.fields[id.0 as usize].def;
        if component >= def.components {
            return Err(ConfigError::FieldComponentOutOfRange {
                name: name.into(),
                component,
                components: def.components,
            });
        }
        if !def.has_set(set) {
            return Err(ConfigError::MissingParameterSet {
                name: name.into(),
                set,
            });
        }
        Ok(FieldRef {
            field: id,
            component,
            set,
        })
    }

    /// Check that a slot exists.
    pub fn contains(&self, slot: FieldRef) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Copy `values` into a slot.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FieldLengthMismatch`] if `values` does not span all
    /// local nodes, [`ConfigError::UnknownField`] if the slot is not stored.
    pub fn initialise(&mut self, slot: FieldRef, values: &[f64]) -> Result<(), ConfigError> {
        if values.len() != self.node_count {
            return Err(ConfigError::FieldLengthMismatch {
                name: self.name_of(slot.field),
                expected: self.node_count,
                actual: values.len(),
            });
        }
        self.slot_mut(slot)?.copy_from_slice(values);
        Ok(())
    }

    /// Set every value of a slot.
    pub fn fill(&mut self, slot: FieldRef, value: f64) -> Result<(), ConfigError> {
        self.slot_mut(slot)?.fill(value);
        Ok(())
    }

    /// Copy every component of `field` from one parameter set to another.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingParameterSet`] if the field lacks either set.
    pub fn copy_set(
        &mut self,
        field: FieldId,
        from: ParameterSet,
        to: ParameterSet,
    ) -> Result<(), ConfigError> {
        let def = self
            .def(field)
            .ok_or_else(|| ConfigError::UnknownField {
                name: field.to_string(),
            })?
            .clone();
        for set in [from, to] {
            if !def.has_set(set) {
                return Err(ConfigError::MissingParameterSet {
                    name: def.name.clone(),
                    set,
                });
            }
        }
        let n = self.node_count;
        for component in 0..def.components {
            let src = self.offset(FieldRef { field, component, set: from })?;
            let dst = self.offset(FieldRef { field, component, set: to })?;
            self.data.copy_within(src..src + n, dst);
        }
        self.bump(field);
        Ok(())
    }

    /// Modification counter of a field.
    pub fn version(&self, field: FieldId) -> u64 {
        self.fields
            .get_index(field.0 as usize)
            .map_or(0, |(_, e)| e.version)
    }

    /// Number of registered fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Total memory usage of field data in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }

    /// Read a slot, mapping absence to a configuration error.
    pub fn get(&self, slot: FieldRef) -> Result<&[f64], ConfigError> {
        let offset = self.offset(slot)?;
        Ok(&self.data[offset..offset + self.node_count])
    }

    fn slot_mut(&mut self, slot: FieldRef) -> Result<&mut [f64], ConfigError> {
        let offset = self.offset(slot)?;
        self.bump(slot.field);
        Ok(&mut self.data[offset..offset + self.node_count])
    }

    fn offset(&self, slot: FieldRef) -> Result<usize, ConfigError> {
        self.slots
            .get(&slot)
            .copied()
            .ok_or_else(|| ConfigError::UnknownField {
                name: slot.to_string(),
            })
    }

    fn bump(&mut self, field: FieldId) {
        if let Some((_, entry)) = self.fields.get_index_mut(field.0 as usize) {
            entry.version += 1;
        }
    }

    fn name_of(&self, field: FieldId) -> String {
        self.def(field)
            .map_or_else(|| field.to_string(), |d| d.name.clone())
    }
}

impl FieldReader for FieldStore {
    fn read(&self, slot: FieldRef) -> Option<&[f64]> {
        self.get(slot).ok()
    }

    fn node_count(&self) -> usize {
        self.node_count
    }
}

impl FieldWriter for FieldStore {
    fn write(&mut self, slot: FieldRef) -> Option<&mut [f64]> {
        self.slot_mut(slot).ok()
    }
}
