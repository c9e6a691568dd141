//! Core types for the cardion monodomain engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! identifiers, field references, time intervals and error taxonomy shared
//! by the mesh, field, reaction, diffusion, exchange and engine crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod id;
pub mod interval;
pub mod traits;

pub use error::{ConfigError, ExchangeError, Failure, Phase, RunError, StepError};
pub use field::{FieldDef, FieldRef, ParameterSet};
pub use id::{ElementId, FieldId, NodeId, PartitionId, StepIndex};
pub use interval::TimeInterval;
pub use traits::{FieldReader, FieldWriter};
