//! Reaction models and their integration for the cardion monodomain engine.
//!
//! A [`ReactionModel`] is an opaque right-hand-side evaluator for a cell's
//! ionic ODE system. An [`Environment`] wraps a model together with the
//! variables the simulation sets per node (*known* parameters) and reads
//! back (*wanted* intermediates); names are resolved once into
//! [`ResolvedVariable`] handles. [`ReactionState`] holds every owned node's
//! state and [`ReactionIntegrator`] advances it in parallel.
//!
//! # Built-in models
//!
//! - [`HodgkinHuxley1952`]: the squid giant axon model.
//! - [`PassiveMembrane`]: a linear leak with an analytic solution.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod environment;
pub mod integrator;
pub mod model;
pub mod models;
pub mod state;

pub use environment::{Environment, EnvironmentBuilder, ResolvedVariable};
pub use integrator::{AdvanceError, ReactionIntegrator, Scheme};
pub use model::{ReactionModel, VariableKind};
pub use models::{HodgkinHuxley1952, PassiveMembrane};
pub use state::ReactionState;
