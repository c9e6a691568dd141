//! Boundary conditions for the diffusion problem.

use crate::mesh::Mesh;
use cardion_core::{ConfigError, NodeId};
use indexmap::IndexMap;

/// Dirichlet values and integrated Neumann fluxes, keyed by global node.
///
/// Nodes with neither entry have a zero-flux (natural) boundary, which is
/// the default for the whole domain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundaryConditions {
    dirichlet: IndexMap<NodeId, f64>,
    neumann: IndexMap<NodeId, f64>,
}

impl BoundaryConditions {
    /// Zero-flux everywhere.
    pub fn zero_flux() -> Self {
        Self::default()
    }

    /// Fix the voltage at `node`.
    pub fn with_dirichlet(mut self, node: NodeId, value: f64) -> Self {
        self.dirichlet.insert(node, value);
        self
    }

    /// Add an integrated boundary flux at `node`.
    ///
    /// The value enters the right-hand side of the node's row directly, so it
    /// is already integrated against the node's basis function along the
    /// boundary. Repeated calls accumulate.
    pub fn with_neumann_flux(mut self, node: NodeId, flux: f64) -> Self {
        *self.neumann.entry(node).or_insert(0.0) += flux;
        self
    }

    /// Dirichlet value of a node, if fixed.
    pub fn dirichlet(&self, node: NodeId) -> Option<f64> {
        self.dirichlet.get(&node).copied()
    }

    /// Integrated Neumann flux of a node (zero when absent).
    pub fn neumann(&self, node: NodeId) -> f64 {
        self.neumann.get(&node).copied().unwrap_or(0.0)
    }

    /// Whether any Dirichlet node is set.
    pub fn has_dirichlet(&self) -> bool {
        !self.dirichlet.is_empty()
    }

    /// Check that every referenced node exists and every value is finite.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBoundary`] on the first offending entry.
    pub fn validate(&self, mesh: &Mesh) -> Result<(), ConfigError> {
        let entries = self
            .dirichlet
            .iter()
            .map(|e| ("dirichlet", e))
            .chain(self.neumann.iter().map(|e| ("neumann", e)));
        for (kind, (node, value)) in entries {
            if node.index() >= mesh.node_count() {
                return Err(ConfigError::InvalidBoundary {
                    reason: format!("{kind} condition on missing node {node}"),
                });
            }
            if !value.is_finite() {
                return Err(ConfigError::InvalidBoundary {
                    reason: format!("{kind} value {value} at node {node} is not finite"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectMeshBuilder;

    #[test]
    fn zero_flux_default() {
        let bc = BoundaryConditions::zero_flux();
        assert!(!bc.has_dirichlet());
        assert_eq!(bc.neumann(NodeId(3)), 0.0);
        assert_eq!(bc.dirichlet(NodeId(3)), None);
    }

    #[test]
    fn neumann_fluxes_accumulate() {
        let bc = BoundaryConditions::zero_flux()
            .with_neumann_flux(NodeId(1), 0.5)
            .with_neumann_flux(NodeId(1), 0.25);
        assert_eq!(bc.neumann(NodeId(1)), 0.75);
    }

    #[test]
    fn validate_checks_nodes_and_values() {
        let mesh = RectMeshBuilder::new(1.0, 1.0, 1, 1).build().unwrap();
        let ok = BoundaryConditions::zero_flux().with_dirichlet(NodeId(0), -75.0);
        assert!(ok.validate(&mesh).is_ok());
        let missing = BoundaryConditions::zero_flux().with_dirichlet(NodeId(4), 0.0);
        assert!(matches!(
            missing.validate(&mesh),
            Err(ConfigError::InvalidBoundary { .. })
        ));
        let nan = BoundaryConditions::zero_flux().with_neumann_flux(NodeId(0), f64::NAN);
        assert!(nan.validate(&mesh).is_err());
    }
}
