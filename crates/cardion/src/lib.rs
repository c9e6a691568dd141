//! Cardion: an operator-split monodomain reaction-diffusion engine.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! cardion sub-crates. For most users, adding `cardion` as a single
//! dependency is sufficient.
//!
//! Each PDE step advances a per-node cellular ODE model (the reaction) and
//! then solves one backward-Euler finite-element diffusion step on the
//! transmembrane potential, over a mesh split into partitions that exchange
//! halo values.
//!
//! # Quick start
//!
//! ```rust
//! use cardion::prelude::*;
//! use std::sync::Arc;
//!
//! let mut config = SimulationConfig::default();
//! config.mesh.elements_x = 6;
//! config.mesh.elements_y = 3;
//! config.time.stimulus_stop = 0.005;
//! config.time.stop = 0.01;
//! config.output_frequency = 0;
//!
//! let mesh = config.mesh.build_mesh().unwrap();
//! let cluster = Cluster::new(mesh, 2).unwrap();
//! let outcome = cluster
//!     .simulate(
//!         &config,
//!         Arc::new(HodgkinHuxley1952::new()),
//!         &BoundaryConditions::zero_flux(),
//!         |_| Box::new(NullSink),
//!     )
//!     .unwrap();
//! assert_eq!(outcome.voltage.len(), 7 * 4);
//! assert!(outcome.voltage[0] > -75.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `cardion-core` | IDs, field references, intervals, error taxonomy |
//! | [`mesh`] | `cardion-mesh` | Meshes, decomposition, partitions, boundaries |
//! | [`field`] | `cardion-field` | The per-partition field store |
//! | [`reaction`] | `cardion-reaction` | Reaction models and the ODE integrator |
//! | [`exchange`] | `cardion-exchange` | Halo exchange and collectives |
//! | [`diffusion`] | `cardion-diffusion` | Assembly and the distributed CG solve |
//! | [`engine`] | `cardion-engine` | Configuration, coupling and orchestration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits and IDs (`cardion-core`).
///
/// Contains node and field identifiers, [`types::TimeInterval`], the
/// error taxonomy and the field access traits ([`types::FieldReader`],
/// [`types::FieldWriter`]).
pub use cardion_core as types;

/// Meshes and their decomposition (`cardion-mesh`).
///
/// [`mesh::RectMeshBuilder`] generates structured quadrilateral meshes;
/// [`mesh::Decomposition`] splits them into [`mesh::Partition`]s.
pub use cardion_mesh as mesh;

/// Field storage (`cardion-field`).
pub use cardion_field as field;

/// Reaction models and their integration (`cardion-reaction`).
///
/// The [`reaction::ReactionModel`] trait is the main extension point for
/// user-defined cell models.
pub use cardion_reaction as reaction;

/// Halo exchange and collectives (`cardion-exchange`).
pub use cardion_exchange as exchange;

/// Finite-element diffusion (`cardion-diffusion`).
pub use cardion_diffusion as diffusion;

/// Configuration, coupling and time stepping (`cardion-engine`).
///
/// [`engine::Orchestrator`] drives one partition;
/// [`engine::Cluster`] runs one orchestrator per partition on threads.
pub use cardion_engine as engine;

/// Common imports for typical cardion usage.
///
/// ```rust
/// use cardion::prelude::*;
/// ```
pub mod prelude {
    // Core types and errors
    pub use cardion_core::{
        ConfigError, ExchangeError, Failure, NodeId, PartitionId, Phase, RunError, StepError,
        StepIndex, TimeInterval,
    };

    // Mesh
    pub use cardion_mesh::{BoundaryConditions, Decomposition, Mesh, Partition, RectMeshBuilder};

    // Reaction
    pub use cardion_reaction::{
        HodgkinHuxley1952, PassiveMembrane, ReactionModel, Scheme, VariableKind,
    };

    // Diffusion
    pub use cardion_diffusion::SolverSettings;

    // Engine
    pub use cardion_engine::{
        ChannelSink, Cluster, ClusterOutcome, NullSink, Orchestrator, OrchestratorBuilder,
        OutputSink, RecordingSink, RunSummary, SimulationConfig, Snapshot, StepMetrics,
        StimulusRegion, TracingSink,
    };
}
