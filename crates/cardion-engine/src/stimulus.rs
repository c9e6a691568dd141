//! Stimulus regions and the on/off stimulus protocol.

use cardion_core::{ConfigError, NodeId, TimeInterval};
use cardion_mesh::Mesh;
use serde::{Deserialize, Serialize};

/// Which nodes receive the stimulus.
///
/// Halves of a row of `N` nodes round down: the first `floor(N / 2)` nodes
/// (or columns) are selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusRegion {
    /// The first half of the bottom row.
    #[default]
    BottomRowLeftHalf,
    /// The first half of the columns, in every row.
    LeftHalf,
    /// An explicit node list.
    Nodes(Vec<NodeId>),
}

impl StimulusRegion {
    /// Resolve to global node ids, ascending.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMesh`] if a row-based region is used on a mesh
    /// without grid structure, [`ConfigError::InvalidBoundary`] if an
    /// explicit node does not exist.
    pub fn nodes(&self, mesh: &Mesh) -> Result<Vec<NodeId>, ConfigError> {
        let grid = || {
            mesh.grid().ok_or_else(|| ConfigError::InvalidMesh {
                reason: "row-based stimulus region needs a structured grid".into(),
            })
        };
        let mut nodes: Vec<NodeId> = match self {
            Self::BottomRowLeftHalf => {
                let g = grid()?;
                let half = g.nodes_x() / 2;
                (0..half).map(|i| g.node(i, 0)).collect()
            }
            Self::LeftHalf => {
                let g = grid()?;
                let half = g.nodes_x() / 2;
                (0..g.nodes_y())
                    .flat_map(|j| (0..half).map(move |i| g.node(i, j)))
                    .collect()
            }
            Self::Nodes(list) => {
                if let Some(bad) = list.iter().find(|n| n.index() >= mesh.node_count()) {
                    return Err(ConfigError::InvalidBoundary {
                        reason: format!("stimulus on missing node {bad}"),
                    });
                }
                list.clone()
            }
        };
        nodes.sort_unstable();
        nodes.dedup();
        Ok(nodes)
    }
}

/// One stimulus phase: the stimulus value held over an interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StimulusPhase {
    /// Value written to stimulated nodes before the phase runs.
    pub value: f64,
    /// Interval the orchestrator runs with that value.
    pub interval: TimeInterval,
}

/// A stimulus switched on over `[start, stop_on)` and off over
/// `[stop_on, stop)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StimulusProtocol {
    /// Stimulated nodes.
    pub nodes: Vec<NodeId>,
    /// Phases in run order.
    pub phases: Vec<StimulusPhase>,
}

impl StimulusProtocol {
    /// A two-phase protocol: `value` until `stimulus_stop`, then zero.
    ///
    /// # Errors
    ///
    /// Interval errors for either phase, or
    /// [`ConfigError::InvalidParameter`] for a non-finite value.
    pub fn on_off(
        nodes: Vec<NodeId>,
        value: f64,
        start: f64,
        stimulus_stop: f64,
        stop: f64,
        step: f64,
    ) -> Result<Self, ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "stimulus.value".into(),
                value,
            });
        }
        Ok(Self {
            nodes,
            phases: vec![
                StimulusPhase {
                    value,
                    interval: TimeInterval::new(start, stimulus_stop, step)?,
                },
                StimulusPhase {
                    value: 0.0,
                    interval: TimeInterval::new(stimulus_stop, stop, step)?,
                },
            ],
        })
    }
}
