//! Field storage for the cardion monodomain engine.
//!
//! A [`FieldStore`] holds every field of one partition in a single
//! contiguous buffer with an offset table, one slot per
//! (field, component, parameter set). Slots span the partition's local
//! nodes (owned first, then halo).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod store;

pub use store::FieldStore;
