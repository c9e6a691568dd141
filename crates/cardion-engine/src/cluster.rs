//! One worker thread per partition.
//!
//! A [`Cluster`] decomposes a mesh, connects one [`ChannelCommunicator`]
//! per partition and runs a closure on each worker inside a thread scope.
//! Workers share nothing mutable; they cooperate only through their
//! communicators. When every worker succeeds the owned voltages are
//! gathered into one global vector indexed by node id.

use crate::config::SimulationConfig;
use crate::orchestrator::{Orchestrator, OrchestratorBuilder, VM};
use crate::output::OutputSink;
use cardion_core::{ConfigError, PartitionId, RunError};
use cardion_exchange::{ChannelCommunicator, Communicator, LocalCommunicator};
use cardion_mesh::{BoundaryConditions, Decomposition, Mesh, Partition};
use cardion_reaction::ReactionModel;
use std::sync::Arc;
use std::thread;

/// The inputs handed to each worker closure.
pub struct Worker<'c> {
    /// This worker's partition.
    pub partition: &'c Partition,
    /// The whole mesh.
    pub mesh: &'c Mesh,
    /// Endpoint connected to every other worker.
    pub communicator: Box<dyn Communicator>,
}

impl Worker<'_> {
    /// An orchestrator builder with this worker's partition and
    /// communicator filled in.
    pub fn builder(self, config: SimulationConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
            .partition(self.partition.clone())
            .communicator(self.communicator)
    }
}

/// Results of a successful cluster run.
#[derive(Debug)]
pub struct ClusterOutcome {
    /// `Vm` of every node, indexed by node id.
    pub voltage: Vec<f64>,
    /// Simulation time reached (identical on every worker).
    pub time: f64,
    /// The workers' orchestrators, in partition order.
    pub workers: Vec<Orchestrator>,
}

/// A decomposed mesh ready to run on threads.
#[derive(Debug)]
pub struct Cluster {
    mesh: Mesh,
    partitions: Vec<Partition>,
}

impl Cluster {
    /// Decompose `mesh` into `partitions` contiguous blocks.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDecomposition`] if the mesh cannot be split.
    pub fn new(mesh: Mesh, partitions: u32) -> Result<Self, ConfigError> {
        let decomposition = Decomposition::calculated(&mesh, partitions)?;
        Self::from_decomposition(mesh, &decomposition)
    }

    /// Use an explicit decomposition.
    pub fn from_decomposition(
        mesh: Mesh,
        decomposition: &Decomposition,
    ) -> Result<Self, ConfigError> {
        let partitions = (0..decomposition.partition_count())
            .map(|p| decomposition.partition(&mesh, PartitionId(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { mesh, partitions })
    }

    /// The mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The partitions, in id order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Run `worker` on every partition concurrently.
    ///
    /// Each closure builds and drives its own orchestrator and returns it.
    /// If any worker fails, the error reported is the first numerical or
    /// configuration error in partition order, falling back to the first
    /// communication error (which peers of a failed worker observe as a
    /// disconnect).
    pub fn run<F>(&self, worker: F) -> Result<ClusterOutcome, RunError>
    where
        F: Fn(Worker<'_>) -> Result<Orchestrator, RunError> + Sync,
    {
        let size = self.partitions.len() as u32;
        let communicators: Vec<Box<dyn Communicator>> = if size == 1 {
            vec![Box::new(LocalCommunicator)]
        } else {
            ChannelCommunicator::mesh(size)
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn Communicator>)
                .collect()
        };

        let results: Vec<Result<Orchestrator, RunError>> = thread::scope(|s| {
            let handles: Vec<_> = self
                .partitions
                .iter()
                .zip(communicators)
                .map(|(partition, communicator)| {
                    let worker = &worker;
                    let mesh = &self.mesh;
                    thread::Builder::new()
                        .name(format!("cardion-{}", partition.id()))
                        .spawn_scoped(s, move || {
                            worker(Worker {
                                partition,
                                mesh,
                                communicator,
                            })
                        })
                })
                .collect();
            handles
                .into_iter()
                .zip(&self.partitions)
                .map(|(handle, partition)| match handle {
                    Ok(h) => h.join().unwrap_or_else(|_| {
                        Err(ConfigError::WorkerPanicked {
                            partition: partition.id(),
                        }
                        .into())
                    }),
                    Err(e) => Err(ConfigError::ThreadSpawnFailed {
                        partition: partition.id(),
                        reason: e.to_string(),
                    }
                    .into()),
                })
                .collect()
        });

        let mut workers = Vec::with_capacity(results.len());
        let mut first_comm = None;
        for result in results {
            match result {
                Ok(o) => workers.push(o),
                Err(e) if e.failure().is_some_and(|f| f.is_communication()) => {
                    first_comm.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(e) = first_comm {
            return Err(e);
        }

        let mut voltage = vec![f64::NAN; self.mesh.node_count()];
        for o in &workers {
            for (node, v) in o.owned_values(VM)? {
                voltage[node.index()] = v;
            }
        }
        let time = workers.first().map_or(0.0, Orchestrator::time);
        Ok(ClusterOutcome {
            voltage,
            time,
            workers,
        })
    }

    /// Run a configuration's stimulus protocol on every partition.
    ///
    /// `sink` is called once per partition to create its output sink. Each
    /// sink is dropped when its worker finishes, so a collector reading a
    /// channel fed by [`ChannelSink`](crate::ChannelSink)s sees it close
    /// even while the returned outcome is alive.
    pub fn simulate<S>(
        &self,
        config: &SimulationConfig,
        model: Arc<dyn ReactionModel>,
        boundary: &BoundaryConditions,
        sink: S,
    ) -> Result<ClusterOutcome, RunError>
    where
        S: Fn(PartitionId) -> Box<dyn OutputSink> + Sync,
    {
        config.validate()?;
        boundary.validate(&self.mesh)?;
        let protocol = config.protocol(&self.mesh)?;
        self.run(|w| {
            let id = w.partition.id();
            let mut orchestrator = w
                .builder(config.clone())
                .shared_model(Arc::clone(&model))
                .boundary(boundary.clone())
                .boxed_sink(sink(id))
                .build()?;
            orchestrator.run_protocol(&protocol)?;
            drop(orchestrator.release_sink());
            Ok(orchestrator)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardion_core::TimeInterval;
    use cardion_mesh::RectMeshBuilder;
    use cardion_reaction::HodgkinHuxley1952;

    #[test]
    fn gathers_voltage_from_every_partition() {
        let mut config = SimulationConfig::default();
        config.mesh.elements_x = 6;
        config.mesh.elements_y = 2;
        config.output_frequency = 0;
        let mesh = config.mesh.build_mesh().unwrap();
        let cluster = Cluster::new(mesh, 3).unwrap();
        let outcome = cluster
            .run(|w| {
                let mut o = w.builder(config.clone()).model(HodgkinHuxley1952::new()).build()?;
                o.run(&TimeInterval::new(0.0, 2e-3, 1e-3)?)?;
                Ok(o)
            })
            .unwrap();
        assert_eq!(outcome.workers.len(), 3);
        assert_eq!(outcome.voltage.len(), 21);
        assert!(outcome.voltage.iter().all(|v| v.is_finite()));
        assert!((outcome.time - 2e-3).abs() < 1e-15);
    }

    #[test]
    fn configuration_errors_win_over_disconnects() {
        let mesh = RectMeshBuilder::new(1.0, 1.0, 4, 1).build().unwrap();
        let cluster = Cluster::new(mesh, 2).unwrap();
        let err = cluster
            .run(|w| {
                let mut config = SimulationConfig::default();
                config.mesh.elements_x = 4;
                config.mesh.elements_y = 1;
                if w.partition.id() == PartitionId(1) {
                    config.materials.cm = -1.0;
                }
                let mut o = w.builder(config).model(HodgkinHuxley1952::new()).build()?;
                o.run(&TimeInterval::new(0.0, 1e-3, 1e-3)?)?;
                Ok(o)
            })
            .unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::InvalidParameter { .. })));
    }
}
