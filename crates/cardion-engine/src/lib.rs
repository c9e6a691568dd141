//! Operator-split time stepping for the cardion monodomain engine.
//!
//! Couples a per-node reaction model to the tissue diffusion solve by
//! first-order (Godunov) splitting. The [`Orchestrator`] drives one
//! partition; a [`Cluster`] runs one orchestrator per partition on its own
//! thread, connected by channel communicators.
//!
//! Setup is explicit: a [`SimulationConfig`] (whose default is the 2D
//! Hodgkin-Huxley sheet problem) goes into an [`OrchestratorBuilder`]
//! together with a partition and a reaction model, and `build()` validates
//! everything before any state exists.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod config;
pub mod coupler;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod stimulus;

pub use cluster::{Cluster, ClusterOutcome, Worker};
pub use config::{
    CouplingConfig, MaterialConfig, MeshConfig, SimulationConfig, StimulusConfig, TimeConfig,
    WantedQuantity,
};
pub use coupler::{FieldCoupler, FieldCouplerBuilder};
pub use metrics::{RunSummary, StepMetrics};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, MATERIALS, STIMULUS, VM};
pub use output::{ChannelSink, NullSink, OutputSink, RecordingSink, Snapshot, TracingSink};
pub use stimulus::{StimulusPhase, StimulusProtocol, StimulusRegion};
