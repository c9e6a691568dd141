//! Benchmark profiles and utilities for the cardion monodomain engine.
//!
//! Provides pre-built [`SimulationConfig`] profiles:
//!
//! - [`reference_profile`]: the default 25x13 Hodgkin-Huxley sheet (364 nodes)
//! - [`stress_profile`]: a 100x50 sheet (5151 nodes) for stress testing
//! - [`single_partition`]: an orchestrator over the whole mesh

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use cardion_core::{ConfigError, PartitionId};
use cardion_engine::{Orchestrator, OrchestratorBuilder, SimulationConfig};
use cardion_mesh::Decomposition;
use cardion_reaction::HodgkinHuxley1952;

/// The default sheet problem with snapshots disabled.
pub fn reference_profile() -> SimulationConfig {
    SimulationConfig {
        output_frequency: 0,
        ..SimulationConfig::default()
    }
}

/// Same problem as [`reference_profile`] on a 100x50 element mesh.
pub fn stress_profile() -> SimulationConfig {
    let mut config = reference_profile();
    config.mesh.elements_x = 100;
    config.mesh.elements_y = 50;
    config
}

/// Build a Hodgkin-Huxley orchestrator for the whole mesh of `config` with
/// the stimulus applied.
pub fn single_partition(config: &SimulationConfig) -> Result<Orchestrator, ConfigError> {
    let mesh = config.mesh.build_mesh()?;
    let partition = Decomposition::calculated(&mesh, 1)?.partition(&mesh, PartitionId(0))?;
    let protocol = config.protocol(&mesh)?;
    let mut orchestrator = OrchestratorBuilder::new(config.clone())
        .partition(partition)
        .model(HodgkinHuxley1952::new())
        .build()?;
    if let Some(on) = protocol.phases.first() {
        orchestrator.set_stimulus(&protocol.nodes, on.value)?;
    }
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_validates() {
        reference_profile().validate().unwrap();
    }

    #[test]
    fn stress_profile_validates() {
        let config = stress_profile();
        config.validate().unwrap();
        assert_eq!(config.mesh.build_mesh().unwrap().node_count(), 101 * 51);
    }

    #[test]
    fn single_partition_is_stimulated() {
        let o = single_partition(&reference_profile()).unwrap();
        let stimulus = o.owned_values(cardion_engine::STIMULUS).unwrap();
        let on = stimulus.iter().filter(|(_, v)| *v != 0.0).count();
        assert_eq!(on, 13);
    }
}
