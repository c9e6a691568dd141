//! The time-step orchestrator: Godunov splitting of reaction and diffusion.
//!
//! [`Orchestrator`] owns everything one partition needs: its field store,
//! reaction state, diffusion solver, couplers and halo exchange. Each call
//! to [`run()`](Orchestrator::run) advances an interval in PDE steps:
//!
//! 1. push stimulus, capacitance and voltage into the reaction state;
//! 2. integrate the reaction over the step with the ODE sub-step;
//! 3. pull voltage and wanted quantities back into fields;
//! 4. solve one backward-Euler diffusion step on `Vm`;
//! 5. push the diffused voltage into the reaction state;
//! 6. reconcile halo copies of `Vm` and the wanted fields.
//!
//! Runs are re-entrant: a second `run()` continues from where the first
//! stopped, possibly with a different step size.
//!
//! # Failure model
//!
//! Every check that does not depend on stepping happens before the first
//! step and is reported as [`RunError::Config`] with nothing mutated.
//! Numerical and communication failures during stepping are fatal and
//! reported as [`RunError::Failed`] with the step, phase, partition and
//! time. Partition collectives are blocking, so a worker that fails drops
//! its endpoints and every peer observes a disconnect.

use crate::config::SimulationConfig;
use crate::coupler::FieldCoupler;
use crate::metrics::{RunSummary, StepMetrics};
use crate::output::{NullSink, OutputSink, Snapshot};
use crate::stimulus::StimulusProtocol;
use cardion_core::interval::SPAN_TOLERANCE;
use cardion_core::{
    ConfigError, Failure, FieldDef, FieldRef, FieldWriter, NodeId, ParameterSet, Phase,
    PartitionId, RunError, StepIndex, TimeInterval,
};
use cardion_diffusion::{DiffusionError, DiffusionFields, DiffusionSolver};
use cardion_exchange::{Communicator, LocalCommunicator, PartitionExchange};
use cardion_field::FieldStore;
use cardion_mesh::{BilinearQuad, BoundaryConditions, Partition};
use cardion_reaction::{
    AdvanceError, Environment, EnvironmentBuilder, ReactionIntegrator, ReactionModel,
    ReactionState,
};
use std::sync::Arc;
use std::time::Instant;

/// Name of the transmembrane potential field.
pub const VM: &str = "Vm";
/// Name of the materials field (`Am`, `Cm`, `sigma_11`, `sigma_22`).
pub const MATERIALS: &str = "materials";
/// Name of the stimulus field.
pub const STIMULUS: &str = "stimulus";

/// Component of [`MATERIALS`] holding the membrane capacitance.
const CM_COMPONENT: u32 = 1;

fn micros(since: Instant) -> u64 {
    since.elapsed().as_micros().try_into().unwrap_or(u64::MAX)
}

/// Where a stepping failure happened.
#[derive(Clone, Copy)]
struct StepContext {
    step: StepIndex,
    partition: PartitionId,
    time: f64,
}

impl StepContext {
    fn fail(self, phase: Phase, failure: impl Into<Failure>) -> RunError {
        let failure = failure.into();
        tracing::warn!(
            step = %self.step,
            %phase,
            partition = %self.partition,
            time = self.time,
            error = %failure,
            "step failed"
        );
        RunError::Failed {
            step: self.step,
            phase,
            partition: self.partition,
            time: self.time,
            failure,
        }
    }

    fn diffusion(self, e: DiffusionError) -> RunError {
        match e {
            DiffusionError::Config(e) => e.into(),
            DiffusionError::Numerical(e) => self.fail(Phase::Diffusion, e),
            DiffusionError::Communication(e) => self.fail(Phase::Diffusion, e),
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Drives the splitting schedule for one partition.
///
/// Built by [`OrchestratorBuilder`].
pub struct Orchestrator {
    partition: Partition,
    store: FieldStore,
    env: Environment,
    state: ReactionState,
    integrator: ReactionIntegrator,
    diffusion: DiffusionSolver,
    /// Step 1 and 3 maps.
    coupler: FieldCoupler,
    /// Step 5 map.
    voltage: FieldCoupler,
    exchange: PartitionExchange,
    setup_fields: Vec<FieldRef>,
    halo_fields: Vec<FieldRef>,
    stimulus: FieldRef,
    time: f64,
    step: StepIndex,
    output_frequency: u64,
    sink: Box<dyn OutputSink>,
    last_metrics: StepMetrics,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("partition", &self.partition.id())
            .field("model", &self.env.model().name())
            .field("time", &self.time)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Steps taken across all runs.
    pub fn step_index(&self) -> StepIndex {
        self.step
    }

    /// This orchestrator's partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The field store.
    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// The reaction environment.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Reaction state of the owned nodes, in local order.
    pub fn reaction_state(&self) -> &ReactionState {
        &self.state
    }

    /// The diffusion solver.
    pub fn diffusion(&self) -> &DiffusionSolver {
        &self.diffusion
    }

    /// Metrics of the most recent step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// Owned values of a scalar field as `(node, value)` pairs, ascending by
    /// node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownField`] if the field does not exist.
    pub fn owned_values(&self, field: &str) -> Result<Vec<(NodeId, f64)>, ConfigError> {
        let slot = self.store.resolve(field, 0, ParameterSet::Values)?;
        let values = self.store.get(slot)?;
        Ok(self
            .partition
            .owned()
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect())
    }

    /// Write `value` into the stimulus field at every listed node present in
    /// this partition, owned or halo. Nodes held elsewhere are skipped.
    ///
    /// Returns the number of local nodes written.
    pub fn set_stimulus(&mut self, nodes: &[NodeId], value: f64) -> Result<usize, ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "stimulus".into(),
                value,
            });
        }
        let locals: Vec<usize> = nodes
            .iter()
            .filter_map(|&n| self.partition.local(n))
            .map(|l| l as usize)
            .collect();
        let values = self
            .store
            .write(self.stimulus)
            .ok_or_else(|| ConfigError::UnknownField {
                name: STIMULUS.into(),
            })?;
        for &l in &locals {
            values[l] = value;
        }
        tracing::debug!(
            partition = %self.partition.id(),
            nodes = locals.len(),
            value,
            "stimulus set"
        );
        Ok(locals.len())
    }

    /// Run every phase of a stimulus protocol: set the phase's stimulus,
    /// then run its interval.
    pub fn run_protocol(&mut self, protocol: &StimulusProtocol) -> Result<RunSummary, RunError> {
        let mut total = RunSummary {
            final_time: self.time,
            ..RunSummary::default()
        };
        for phase in &protocol.phases {
            self.set_stimulus(&protocol.nodes, phase.value)?;
            let summary = self.run(&phase.interval)?;
            total.steps += summary.steps;
            total.cg_iterations += summary.cg_iterations;
            total.snapshots += summary.snapshots;
            total.final_time = summary.final_time;
            total.last_step = summary.last_step;
        }
        Ok(total)
    }

    /// Check that `interval` can be run from the current state.
    fn check(&self, interval: &TimeInterval) -> Result<u64, ConfigError> {
        let steps = interval.step_count()?;
        interval.sub_steps(self.integrator.dt_sub())?;
        let scale = interval.step.max(self.time.abs());
        if (interval.start - self.time).abs() > SPAN_TOLERANCE * scale {
            return Err(ConfigError::IntervalDiscontinuity {
                current: self.time,
                requested: interval.start,
            });
        }
        Ok(steps)
    }

    /// Advance from `interval.start` to `interval.stop` in steps of
    /// `interval.step`.
    ///
    /// # Errors
    ///
    /// [`RunError::Config`] if the interval is malformed, the ODE sub-step
    /// does not divide the step exactly, or `interval.start` is not the
    /// current time; nothing is mutated in that case.
    /// [`RunError::Failed`] for numerical or communication failures.
    pub fn run(&mut self, interval: &TimeInterval) -> Result<RunSummary, RunError> {
        let steps = self.check(interval)?;
        let partition = self.partition.id();
        tracing::info!(
            %partition,
            start = interval.start,
            stop = interval.stop,
            step = interval.step,
            steps,
            "run started"
        );

        let ctx = StepContext {
            step: self.step,
            partition,
            time: self.time,
        };
        self.exchange
            .reconcile(&mut self.store, &self.setup_fields)
            .map_err(|e| ctx.fail(Phase::Setup, e))?;

        let mut summary = RunSummary {
            final_time: self.time,
            ..RunSummary::default()
        };
        if self.step == StepIndex(0) && self.emit()? {
            summary.snapshots += 1;
        }

        for k in 0..steps {
            let t = interval.time_at(k, steps);
            let t_next = interval.time_at(k + 1, steps);
            let metrics = self.step_once(t, t_next, interval.step)?;
            self.time = t_next;
            self.step = self.step.next();
            summary.steps += 1;
            summary.cg_iterations += u64::from(metrics.cg_iterations);
            tracing::debug!(
                %partition,
                step = %self.step,
                time = self.time,
                cg_iterations = metrics.cg_iterations,
                total_us = metrics.total_us,
                "step complete"
            );
            self.last_metrics = metrics;
            if self.output_frequency > 0
                && self.step.0 % self.output_frequency == 0
                && self.emit()?
            {
                summary.snapshots += 1;
            }
        }

        summary.final_time = self.time;
        summary.last_step = self.last_metrics.clone();
        tracing::info!(
            %partition,
            steps = summary.steps,
            time = summary.final_time,
            cg_iterations = summary.cg_iterations,
            "run finished"
        );
        Ok(summary)
    }

    fn step_once(&mut self, t: f64, t_next: f64, dt: f64) -> Result<StepMetrics, RunError> {
        let ctx = StepContext {
            step: self.step,
            partition: self.partition.id(),
            time: t,
        };
        let started = Instant::now();
        let mut metrics = StepMetrics::default();

        let phase = Instant::now();
        self.coupler.push_to_reaction(&self.store, &mut self.state)?;
        metrics.push_us = micros(phase);

        let phase = Instant::now();
        metrics.reaction_sub_steps = self
            .integrator
            .advance(&self.env, &mut self.state, self.partition.owned(), t, t_next)
            .map_err(|e| match e {
                AdvanceError::Config(e) => RunError::Config(e),
                AdvanceError::Numerical(e) => ctx.fail(Phase::Reaction, e),
            })?;
        metrics.reaction_us = micros(phase);

        let phase = Instant::now();
        self.coupler.pull_from_reaction(&self.state, &mut self.store)?;
        metrics.pull_us = micros(phase);

        let phase = Instant::now();
        let stats = self
            .diffusion
            .solve_step(&mut self.store, &mut self.exchange, dt)
            .map_err(|e| ctx.diffusion(e))?;
        metrics.cg_iterations = stats.iterations;
        metrics.cg_residual = stats.residual;
        metrics.diffusion_us = micros(phase);

        let phase = Instant::now();
        self.voltage.push_to_reaction(&self.store, &mut self.state)?;
        metrics.push_us += micros(phase);

        let phase = Instant::now();
        self.exchange
            .reconcile(&mut self.store, &self.halo_fields)
            .map_err(|e| ctx.fail(Phase::Exchange, e))?;
        metrics.exchange_us = micros(phase);

        metrics.total_us = micros(started);
        Ok(metrics)
    }

    /// A snapshot of the owned voltage at the current step.
    pub fn snapshot(&self) -> Result<Snapshot, ConfigError> {
        let (nodes, vm) = self.owned_values(VM)?.into_iter().unzip();
        Ok(Snapshot {
            step: self.step,
            time: self.time,
            partition: self.partition.id(),
            nodes,
            vm,
        })
    }

    /// Detach the output sink, leaving a [`NullSink`] in its place.
    ///
    /// Channel-backed sinks hold a sender; releasing them lets a collector
    /// see the channel close while the orchestrator itself is kept.
    pub fn release_sink(&mut self) -> Box<dyn OutputSink> {
        std::mem::replace(&mut self.sink, Box::new(NullSink))
    }

    fn emit(&mut self) -> Result<bool, ConfigError> {
        if self.output_frequency == 0 {
            return Ok(false);
        }
        let snapshot = self.snapshot()?;
        self.sink.record(snapshot);
        Ok(true)
    }
}

// ── OrchestratorBuilder ─────────────────────────────────────────────

/// Assembles an [`Orchestrator`] for one partition.
///
/// ```
/// use cardion_engine::{OrchestratorBuilder, SimulationConfig};
/// use cardion_mesh::{Decomposition, RectMeshBuilder};
/// use cardion_reaction::HodgkinHuxley1952;
/// use cardion_core::{PartitionId, TimeInterval};
///
/// let mut config = SimulationConfig::default();
/// config.mesh.elements_x = 4;
/// config.mesh.elements_y = 1;
/// let mesh = config.mesh.build_mesh().unwrap();
/// let dec = Decomposition::calculated(&mesh, 1).unwrap();
/// let mut orchestrator = OrchestratorBuilder::new(config)
///     .partition(dec.partition(&mesh, PartitionId(0)).unwrap())
///     .model(HodgkinHuxley1952::new())
///     .build()
///     .unwrap();
/// let summary = orchestrator.run(&TimeInterval::new(0.0, 0.002, 0.001).unwrap()).unwrap();
/// assert_eq!(summary.steps, 2);
/// ```
pub struct OrchestratorBuilder {
    config: SimulationConfig,
    partition: Option<Partition>,
    communicator: Option<Box<dyn Communicator>>,
    model: Option<Arc<dyn ReactionModel>>,
    boundary: BoundaryConditions,
    sink: Box<dyn OutputSink>,
}

impl OrchestratorBuilder {
    /// Start from a configuration.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            partition: None,
            communicator: None,
            model: None,
            boundary: BoundaryConditions::zero_flux(),
            sink: Box::new(NullSink),
        }
    }

    /// The partition to run.
    pub fn partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// The communicator connecting this partition to its peers. Optional for
    /// a single partition.
    pub fn communicator(mut self, communicator: Box<dyn Communicator>) -> Self {
        self.communicator = Some(communicator);
        self
    }

    /// The reaction model.
    pub fn model(self, model: impl ReactionModel) -> Self {
        self.shared_model(Arc::new(model))
    }

    /// A reaction model shared with other partitions.
    pub fn shared_model(mut self, model: Arc<dyn ReactionModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Boundary conditions. Default: zero flux everywhere.
    pub fn boundary(mut self, boundary: BoundaryConditions) -> Self {
        self.boundary = boundary;
        self
    }

    /// Where snapshots go. Default: discarded.
    pub fn sink(self, sink: impl OutputSink + 'static) -> Self {
        self.boxed_sink(Box::new(sink))
    }

    /// As [`sink`](Self::sink), for an already boxed sink.
    pub fn boxed_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate everything and set up fields, reaction state and solvers.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingComponent`] for a missing partition, model or
    /// (with several partitions) communicator; any validation error from the
    /// configuration, the model environment or the coupling maps.
    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        let config = self.config;
        config.validate()?;
        let partition = self
            .partition
            .ok_or(ConfigError::MissingComponent { name: "partition" })?;
        let model = self
            .model
            .ok_or(ConfigError::MissingComponent { name: "reaction model" })?;
        let communicator: Box<dyn Communicator> = match self.communicator {
            Some(c) => c,
            None if partition.partition_count() == 1 => Box::new(LocalCommunicator),
            None => return Err(ConfigError::MissingComponent { name: "communicator" }),
        };
        let exchange = PartitionExchange::new(&partition, communicator)?;

        let coupling = &config.coupling;
        let env = coupling
            .wanted
            .iter()
            .fold(
                EnvironmentBuilder::from_shared(model)
                    .known(coupling.stimulus.as_str())
                    .known(coupling.capacitance.as_str()),
                |b, w| b.wanted(w.variable.as_str()),
            )
            .build()?;

        let mut store = FieldStore::new(partition.local_count());
        store.register(FieldDef::scalar(VM).keep_previous().units("mV"))?;
        store.register(FieldDef::with_components(MATERIALS, 4))?;
        store.register(FieldDef::scalar(STIMULUS))?;
        for w in &coupling.wanted {
            store.register(FieldDef::scalar(w.field.as_str()))?;
        }

        let fields = DiffusionFields::resolve(&store, VM, MATERIALS)?;
        for (slot, value) in fields.materials.iter().zip(config.materials.components()) {
            store.fill(*slot, value)?;
        }
        store.fill(fields.vm, config.initial_voltage)?;
        store.fill(fields.vm_previous, config.initial_voltage)?;
        let stimulus = store.resolve(STIMULUS, 0, ParameterSet::Values)?;

        let coupler = coupling
            .wanted
            .iter()
            .fold(
                FieldCoupler::builder(&env, &store)
                    .push(STIMULUS, 0, &coupling.stimulus)
                    .push(MATERIALS, CM_COMPONENT, &coupling.capacitance)
                    .push(VM, 0, &coupling.voltage)
                    .pull(&coupling.voltage, VM, 0),
                |b, w| b.pull(&w.variable, &w.field, 0),
            )
            .build()?;
        let voltage = FieldCoupler::builder(&env, &store)
            .push(VM, 0, &coupling.voltage)
            .build()?;

        let mut setup_fields = vec![fields.vm];
        setup_fields.extend(fields.materials);
        setup_fields.push(stimulus);
        let mut halo_fields = vec![fields.vm, fields.vm_previous];
        halo_fields.extend(coupler.pull_maps().iter().map(|&(_, slot)| slot).filter(|&s| s != fields.vm));

        let diffusion = DiffusionSolver::new(
            &partition,
            fields,
            &self.boundary,
            BilinearQuad::new(config.mesh.quadrature_points)?,
            config.solver,
        )?;
        let integrator = ReactionIntegrator::new(config.scheme, config.time.ode_step)?;
        let state = ReactionState::new(&env, partition.owned_count());

        tracing::debug!(
            partition = %partition.id(),
            owned = partition.owned_count(),
            halo = partition.halo().len(),
            model = env.model().name(),
            fields = store.field_count(),
            bytes = store.memory_bytes(),
            "orchestrator built"
        );

        Ok(Orchestrator {
            partition,
            store,
            env,
            state,
            integrator,
            diffusion,
            coupler,
            voltage,
            exchange,
            setup_fields,
            halo_fields,
            stimulus,
            time: config.time.start,
            step: StepIndex(0),
            output_frequency: config.output_frequency,
            sink: self.sink,
            last_metrics: StepMetrics::default(),
        })
    }
}
