//! Per-step performance metrics and run summaries.
//!
//! [`StepMetrics`] captures timing and solver data for a single splitting
//! step; [`RunSummary`] aggregates one call to
//! [`Orchestrator::run`](crate::Orchestrator::run).

use serde::Serialize;

/// Timing and solver metrics collected during a single step.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepMetrics {
    /// Wall-clock time for the entire step.
    pub total_us: u64,
    /// Field to reaction pushes (stimulus, capacitance, voltage).
    pub push_us: u64,
    /// Reaction integration.
    pub reaction_us: u64,
    /// Reaction to field pulls.
    pub pull_us: u64,
    /// Diffusion assembly (when needed) and solve.
    pub diffusion_us: u64,
    /// Halo reconcile.
    pub exchange_us: u64,
    /// Reaction sub-steps taken.
    pub reaction_sub_steps: u64,
    /// Conjugate-gradient iterations.
    pub cg_iterations: u32,
    /// Final relative CG residual.
    pub cg_residual: f64,
}

/// Outcome of one orchestrator run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Steps taken in this run.
    pub steps: u64,
    /// Simulation time at the end of the run.
    pub final_time: f64,
    /// CG iterations summed over the run.
    pub cg_iterations: u64,
    /// Snapshots delivered to the output sink.
    pub snapshots: u64,
    /// Metrics of the last step.
    pub last_step: StepMetrics,
}
