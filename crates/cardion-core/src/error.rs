//! Error types for the cardion engine.
//!
//! Organized by origin: configuration (refused before stepping), numerical
//! (raised by the reaction integrator or the diffusion solver) and
//! communication (raised by the partition exchange). [`RunError`] is what
//! the orchestrator returns and adds step/phase/partition context.

use crate::id::{NodeId, PartitionId, StepIndex};
use std::fmt;
use thiserror::Error;

/// Problems detected before any state is mutated.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Interval bounds or step are not finite, reversed, or non-positive.
    #[error("invalid time interval [{start}, {stop}] with step {step}")]
    InvalidInterval {
        /// Requested start time.
        start: f64,
        /// Requested stop time.
        stop: f64,
        /// Requested step.
        step: f64,
    },
    /// The interval length is not an integer multiple of the step.
    #[error("interval length {length} is not an integer multiple of step {step}")]
    IntervalNotDivisible {
        /// Interval length.
        length: f64,
        /// Step size.
        step: f64,
    },
    /// The PDE step is not an exact integer multiple of the ODE sub-step.
    #[error("pde step {pde_step} is not an exact integer multiple of ode step {ode_step}")]
    SubStepNotDivisible {
        /// PDE step size.
        pde_step: f64,
        /// ODE sub-step size.
        ode_step: f64,
    },
    /// A run was requested from a time other than the current one.
    #[error("run starts at {requested} but the simulation is at {current}")]
    IntervalDiscontinuity {
        /// Current simulation time.
        current: f64,
        /// Requested start time.
        requested: f64,
    },
    /// A scalar parameter is out of range.
    #[error("invalid value {value} for parameter '{name}'")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: f64,
    },
    /// The reaction model has no variable with this name.
    #[error("reaction model has no variable '{name}'")]
    UnknownVariable {
        /// Requested variable name.
        name: String,
    },
    /// A parameter is written per node but was not flagged known.
    #[error("parameter '{name}' is not flagged known")]
    VariableNotKnown {
        /// Parameter name.
        name: String,
    },
    /// An intermediate is read but was not flagged wanted.
    #[error("intermediate '{name}' is not flagged wanted")]
    VariableNotWanted {
        /// Intermediate name.
        name: String,
    },
    /// A variable is used in a direction its kind does not support.
    #[error("variable '{name}' cannot be used as {usage}")]
    InvalidVariableUsage {
        /// Variable name.
        name: String,
        /// Attempted usage, e.g. `"a coupling target"`.
        usage: &'static str,
    },
    /// No field with this name is registered.
    #[error("no field named '{name}'")]
    UnknownField {
        /// Requested field name.
        name: String,
    },
    /// A field component index is out of range.
    #[error("field '{name}' has {components} components, component {component} requested")]
    FieldComponentOutOfRange {
        /// Field name.
        name: String,
        /// Requested 0-based component.
        component: u32,
        /// Number of components of the field.
        components: u32,
    },
    /// A field slot was requested in a parameter set the field lacks.
    #[error("field '{name}' does not store the {set} set")]
    MissingParameterSet {
        /// Field name.
        name: String,
        /// Requested set.
        set: crate::ParameterSet,
    },
    /// A field name was registered twice.
    #[error("field '{name}' is already registered")]
    DuplicateField {
        /// Field name.
        name: String,
    },
    /// A field definition is malformed.
    #[error("invalid field definition: {reason}")]
    InvalidField {
        /// Description of the problem.
        reason: String,
    },
    /// Initial data has the wrong length for the target slot.
    #[error("field '{name}' expects {expected} values, got {actual}")]
    FieldLengthMismatch {
        /// Field name.
        name: String,
        /// Expected number of values.
        expected: usize,
        /// Provided number of values.
        actual: usize,
    },
    /// A material property is non-finite or non-positive.
    #[error("invalid material property {property}={value} at node {node}")]
    InvalidMaterial {
        /// Property name (`Am`, `Cm`, `sigma_11`, `sigma_22`).
        property: &'static str,
        /// Offending value.
        value: f64,
        /// Global node id.
        node: NodeId,
    },
    /// The mesh description is malformed.
    #[error("invalid mesh: {reason}")]
    InvalidMesh {
        /// Description of the problem.
        reason: String,
    },
    /// The decomposition is inconsistent with the mesh.
    #[error("invalid decomposition: {reason}")]
    InvalidDecomposition {
        /// Description of the problem.
        reason: String,
    },
    /// Boundary conditions reference unknown nodes or are non-finite.
    #[error("invalid boundary condition: {reason}")]
    InvalidBoundary {
        /// Description of the problem.
        reason: String,
    },
    /// Linear solver settings are out of range.
    #[error("invalid solver settings: {reason}")]
    InvalidSolver {
        /// Description of the problem.
        reason: String,
    },
    /// A builder was finalized without a required input.
    #[error("missing required component: {name}")]
    MissingComponent {
        /// Name of the missing input.
        name: &'static str,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker for partition {partition}: {reason}")]
    ThreadSpawnFailed {
        /// Partition the worker would have run.
        partition: PartitionId,
        /// Description from the OS.
        reason: String,
    },
    /// A worker thread panicked.
    #[error("worker for partition {partition} panicked")]
    WorkerPanicked {
        /// Partition the worker was running.
        partition: PartitionId,
    },
    /// The partition's communicator does not match the decomposition.
    #[error("communicator rank {rank} of {size} does not match partition {partition} of {partitions}")]
    CommunicatorMismatch {
        /// Communicator rank.
        rank: u32,
        /// Communicator size.
        size: u32,
        /// Partition id.
        partition: PartitionId,
        /// Number of partitions in the decomposition.
        partitions: u32,
    },
}

/// Numerical failures raised during a step.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StepError {
    /// A reaction state variable became NaN or infinite.
    #[error("non-finite value in '{variable}' at node {node} after sub-step {sub_step}")]
    NonFiniteState {
        /// Global id of the lowest failing node.
        node: NodeId,
        /// Name of the first non-finite state variable of that node.
        variable: String,
        /// 1-based sub-step after which the value was observed.
        sub_step: u64,
    },
    /// The linear solver did not converge.
    #[error("linear solver did not converge after {iterations} iterations (residual {residual:e})")]
    SolverDiverged {
        /// Iterations performed.
        iterations: u32,
        /// Relative residual at termination.
        residual: f64,
    },
}

/// Communication failures between partitions.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// A peer endpoint has been dropped.
    #[error("peer {peer} disconnected")]
    Disconnected {
        /// The unreachable peer.
        peer: PartitionId,
    },
    /// A message arrived out of sequence.
    #[error("protocol mismatch with peer {peer}: expected sequence {expected}, got {actual}")]
    ProtocolMismatch {
        /// Sending peer.
        peer: PartitionId,
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        actual: u64,
    },
    /// A message had the wrong payload length.
    #[error("message from peer {peer} has {actual} values, expected {expected}")]
    MessageLength {
        /// Sending peer.
        peer: PartitionId,
        /// Expected payload length.
        expected: usize,
        /// Received payload length.
        actual: usize,
    },
    /// A field slot named for exchange is not stored locally.
    #[error("field slot {slot} is not stored locally")]
    UnknownSlot {
        /// Display form of the slot.
        slot: String,
    },
    /// A peer id is outside the communicator.
    #[error("peer {peer} is not part of a communicator of size {size}")]
    UnknownPeer {
        /// Requested peer.
        peer: PartitionId,
        /// Communicator size.
        size: u32,
    },
}

/// Orchestrator phase during which a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Start-of-run halo reconcile.
    Setup,
    /// Reaction integration.
    Reaction,
    /// Diffusion solve, including its halo updates and reductions.
    Diffusion,
    /// End-of-step halo reconcile.
    Exchange,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::Reaction => "reaction",
            Self::Diffusion => "diffusion",
            Self::Exchange => "exchange",
        };
        f.write_str(s)
    }
}

/// Underlying cause of a failed run.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Failure {
    /// Numerical failure.
    #[error(transparent)]
    Numerical(#[from] StepError),
    /// Communication failure.
    #[error(transparent)]
    Communication(#[from] ExchangeError),
}

impl Failure {
    /// Whether this failure is a consequence of another worker failing.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

/// Error returned by an orchestrator run.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RunError {
    /// The run was refused before any state was mutated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The run failed while stepping.
    #[error("step {step} ({phase}) failed on partition {partition} at t={time}: {failure}")]
    Failed {
        /// Index of the failing step.
        step: StepIndex,
        /// Phase within the step.
        phase: Phase,
        /// Partition that observed the failure.
        partition: PartitionId,
        /// Simulation time at the start of the failing step.
        time: f64,
        /// Cause.
        #[source]
        failure: Failure,
    },
}

impl RunError {
    /// The failure cause, if the run failed while stepping.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed { failure, .. } => Some(failure),
            Self::Config(_) => None,
        }
    }
}
