//! Test utilities for cardion development.
//!
//! Provides a mock field store, deterministic reaction models with known
//! failure behaviour, and mesh fixtures shared by the integration tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod models;

pub use fixtures::{partitions, strip_mesh, unit_square};
pub use models::{ConstantRate, ExplodingModel};

use cardion_core::{FieldReader, FieldRef, FieldWriter};
use std::collections::HashMap;

/// A minimal field store backed by one `Vec<f64>` per slot.
///
/// Implements [`FieldReader`] and [`FieldWriter`] so exchange and coupling
/// code can be tested without the real store's registration rules.
#[derive(Clone, Debug, Default)]
pub struct MockFieldStore {
    node_count: usize,
    slots: HashMap<FieldRef, Vec<f64>>,
    writes: usize,
}

impl MockFieldStore {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            ..Self::default()
        }
    }

    /// Insert a slot filled with `values`.
    pub fn with_slot(mut self, slot: FieldRef, values: Vec<f64>) -> Self {
        self.slots.insert(slot, values);
        self
    }

    /// How many times [`FieldWriter::write`] succeeded.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl FieldReader for MockFieldStore {
    fn read(&self, slot: FieldRef) -> Option<&[f64]> {
        self.slots.get(&slot).map(Vec::as_slice)
    }

    fn node_count(&self) -> usize {
        self.node_count
    }
}

impl FieldWriter for MockFieldStore {
    fn write(&mut self, slot: FieldRef) -> Option<&mut [f64]> {
        let values = self.slots.get_mut(&slot)?;
        self.writes += 1;
        Some(values.as_mut_slice())
    }
}
