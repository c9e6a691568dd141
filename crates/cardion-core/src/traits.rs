//! Abstraction traits for field access.

use crate::field::FieldRef;

/// Read-only access to per-node field data.
///
/// Implemented by field stores so that the coupler, the diffusion solver and
/// the partition exchange can read field slots without depending on the
/// store's layout. Slices are indexed by local node number.
pub trait FieldReader {
    /// Read one field slot as a flat f64 slice over local nodes.
    ///
    /// Returns `None` if the reference does not name a stored slot.
    fn read(&self, slot: FieldRef) -> Option<&[f64]>;

    /// Number of local nodes each slot spans.
    fn node_count(&self) -> usize;
}

/// Mutable access to per-node field data.
///
/// Every successful `write` counts as a modification of the field.
pub trait FieldWriter {
    /// Get a mutable slice for one field slot.
    ///
    /// Returns `None` if the reference does not name a stored slot.
    fn write(&mut self, slot: FieldRef) -> Option<&mut [f64]>;
}
