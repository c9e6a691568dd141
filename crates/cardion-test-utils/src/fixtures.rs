//! Mesh and partition fixtures.
//!
//! These panic on invalid input; they are only called from tests.

use cardion_core::PartitionId;
use cardion_mesh::{Decomposition, Mesh, Partition, RectMeshBuilder};

/// A strip of `elements` square elements, one element high, `length` long.
///
/// Nodes `0..=elements` form the bottom row and the rest the top row.
pub fn strip_mesh(elements: u32, length: f64) -> Mesh {
    RectMeshBuilder::new(length, length / f64::from(elements), elements, 1)
        .build()
        .expect("strip mesh dimensions are valid")
}

/// The unit square split into `n x n` elements.
pub fn unit_square(n: u32) -> Mesh {
    RectMeshBuilder::new(1.0, 1.0, n, n)
        .build()
        .expect("unit square dimensions are valid")
}

/// Every partition of the default contiguous decomposition of `mesh`.
pub fn partitions(mesh: &Mesh, count: u32) -> Vec<Partition> {
    let decomposition = Decomposition::calculated(mesh, count).expect("mesh is decomposable");
    (0..count)
        .map(|p| {
            decomposition
                .partition(mesh, PartitionId(p))
                .expect("partition id is in range")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_has_two_rows() {
        let mesh = strip_mesh(8, 0.08);
        assert_eq!(mesh.node_count(), 18);
        assert_eq!(mesh.element_count(), 8);
        let top_right = mesh.position(cardion_core::NodeId(17));
        assert!((top_right[0] - 0.08).abs() < 1e-15);
        assert!((top_right[1] - 0.01).abs() < 1e-15);
    }

    #[test]
    fn partitions_cover_every_node_once() {
        let mesh = unit_square(4);
        let parts = partitions(&mesh, 3);
        let owned: usize = parts.iter().map(Partition::owned_count).sum();
        assert_eq!(owned, mesh.node_count());
    }
}
