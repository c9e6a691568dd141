//! Quadrilateral meshes and the rectangular mesh generator.

use cardion_core::{ConfigError, ElementId, NodeId};
use serde::{Deserialize, Serialize};

/// Number of nodes of a bilinear quadrilateral element.
pub const NODES_PER_ELEMENT: usize = 4;

/// Logical grid dimensions of a structured mesh.
///
/// Present on meshes produced by [`RectMeshBuilder`]. Node `(i, j)` (column
/// `i`, row `j`, row 0 at the bottom) has id `j * nodes_x + i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Elements along x.
    pub elements_x: u32,
    /// Elements along y.
    pub elements_y: u32,
}

impl GridShape {
    /// Nodes per row.
    pub fn nodes_x(&self) -> u32 {
        self.elements_x + 1
    }

    /// Nodes per column.
    pub fn nodes_y(&self) -> u32 {
        self.elements_y + 1
    }

    /// Id of the node at column `i`, row `j`.
    pub fn node(&self, i: u32, j: u32) -> NodeId {
        NodeId(j * self.nodes_x() + i)
    }

    /// Nodes of row `j`, left to right.
    pub fn row(&self, j: u32) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes_x()).map(move |i| self.node(i, j))
    }
}

/// A 2D mesh of 4-node quadrilaterals.
///
/// Element nodes follow tensor-product order in xi space:
/// `(0,0), (1,0), (0,1), (1,1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    positions: Vec<[f64; 2]>,
    elements: Vec<[NodeId; NODES_PER_ELEMENT]>,
    grid: Option<GridShape>,
}

impl Mesh {
    /// Build a mesh from explicit positions and connectivity.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMesh`] if the mesh is empty, a position is not
    /// finite, an element references a missing node or repeats one, or a
    /// node belongs to no element.
    pub fn new(
        positions: Vec<[f64; 2]>,
        elements: Vec<[NodeId; NODES_PER_ELEMENT]>,
    ) -> Result<Self, ConfigError> {
        let mesh = Self {
            positions,
            elements,
            grid: None,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidMesh { reason };
        if self.elements.is_empty() || self.positions.is_empty() {
            return Err(invalid("mesh must have at least one element".into()));
        }
        if self.positions.len() > u32::MAX as usize || self.elements.len() > u32::MAX as usize {
            return Err(invalid("mesh is too large for 32-bit ids".into()));
        }
        if let Some(n) = self
            .positions
            .iter()
            .position(|p| !(p[0].is_finite() && p[1].is_finite()))
        {
            return Err(invalid(format!("node {n} has a non-finite position")));
        }
        let mut used = vec![false; self.positions.len()];
        for (e, nodes) in self.elements.iter().enumerate() {
            for (k, node) in nodes.iter().enumerate() {
                if node.index() >= self.positions.len() {
                    return Err(invalid(format!("element {e} references missing node {node}")));
                }
                if nodes[..k].contains(node) {
                    return Err(invalid(format!("element {e} repeats node {node}")));
                }
                used[node.index()] = true;
            }
        }
        if let Some(n) = used.iter().position(|u| !u) {
            return Err(invalid(format!("node {n} belongs to no element")));
        }
        Ok(())
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Position of a node.
    pub fn position(&self, node: NodeId) -> [f64; 2] {
        self.positions[node.index()]
    }

    /// All node positions, indexed by node id.
    pub fn positions(&self) -> &[[f64; 2]] {
        &self.positions
    }

    /// Nodes of an element in tensor-product order.
    pub fn element(&self, element: ElementId) -> &[NodeId; NODES_PER_ELEMENT] {
        &self.elements[element.index()]
    }

    /// All element connectivity, indexed by element id.
    pub fn elements(&self) -> &[[NodeId; NODES_PER_ELEMENT]] {
        &self.elements
    }

    /// Grid dimensions, if the mesh is structured.
    pub fn grid(&self) -> Option<GridShape> {
        self.grid
    }
}

/// Builder for a regular rectangular mesh of bilinear quads.
///
/// The domain is `[origin_x, origin_x + width] x [origin_y, origin_y + height]`.
/// Nodes are numbered row by row from the bottom-left corner; elements
/// likewise.
///
/// ```
/// use cardion_mesh::RectMeshBuilder;
/// let mesh = RectMeshBuilder::new(0.1, 0.05, 25, 13).build().unwrap();
/// assert_eq!(mesh.node_count(), 26 * 14);
/// assert_eq!(mesh.element_count(), 25 * 13);
/// ```
#[derive(Clone, Debug)]
pub struct RectMeshBuilder {
    width: f64,
    height: f64,
    elements_x: u32,
    elements_y: u32,
    origin: [f64; 2],
}

impl RectMeshBuilder {
    /// A `width x height` rectangle with `elements_x x elements_y` elements.
    pub fn new(width: f64, height: f64, elements_x: u32, elements_y: u32) -> Self {
        Self {
            width,
            height,
            elements_x,
            elements_y,
            origin: [0.0, 0.0],
        }
    }

    /// Move the bottom-left corner.
    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin = [x, y];
        self
    }

    /// Generate the mesh.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMesh`] if a dimension is not finite and
    /// positive or an element count is zero.
    pub fn build(self) -> Result<Mesh, ConfigError> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(ConfigError::InvalidMesh {
                reason: format!("domain {}x{} must be positive", self.width, self.height),
            });
        }
        if self.elements_x == 0 || self.elements_y == 0 {
            return Err(ConfigError::InvalidMesh {
                reason: "element counts must be non-zero".into(),
            });
        }
        let grid = GridShape {
            elements_x: self.elements_x,
            elements_y: self.elements_y,
        };
        let (nx, ny) = (grid.nodes_x(), grid.nodes_y());

        let mut positions = Vec::with_capacity(nx as usize * ny as usize);
        for j in 0..ny {
            for i in 0..nx {
                let x = self.origin[0] + self.width * f64::from(i) / f64::from(self.elements_x);
                let y = self.origin[1] + self.height * f64::from(j) / f64::from(self.elements_y);
                positions.push([x, y]);
            }
        }

        let mut elements = Vec::with_capacity(self.elements_x as usize * self.elements_y as usize);
        for j in 0..self.elements_y {
            for i in 0..self.elements_x {
                elements.push([
                    grid.node(i, j),
                    grid.node(i + 1, j),
                    grid.node(i, j + 1),
                    grid.node(i + 1, j + 1),
                ]);
            }
        }

        let mut mesh = Mesh::new(positions, elements)?;
        mesh.grid = Some(grid);
        Ok(mesh)
    }
}
