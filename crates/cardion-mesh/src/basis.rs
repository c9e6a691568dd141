//! Bilinear Lagrange basis on quadrilaterals with Gauss-Legendre quadrature.
//!
//! The reference element is the unit square `xi in [0, 1]^2`. Basis function
//! `k` is attached to the node at tensor-product position
//! `(k % 2, k / 2)`, matching the node order of [`Mesh`](crate::Mesh).

use crate::mesh::NODES_PER_ELEMENT;
use cardion_core::ConfigError;
use smallvec::SmallVec;

/// Gauss-Legendre points and weights on `[-1, 1]`, indexed by point count.
const GAUSS_LEGENDRE: [&[(f64, f64)]; 4] = [
    &[(0.0, 2.0)],
    &[(-0.577_350_269_189_625_8, 1.0), (0.577_350_269_189_625_8, 1.0)],
    &[
        (-0.774_596_669_241_483_4, 5.0 / 9.0),
        (0.0, 8.0 / 9.0),
        (0.774_596_669_241_483_4, 5.0 / 9.0),
    ],
    &[
        (-0.861_136_311_594_052_6, 0.347_854_845_137_453_9),
        (-0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
        (0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
        (0.861_136_311_594_052_6, 0.347_854_845_137_453_9),
    ],
];

/// Largest supported number of Gauss points per xi direction.
pub const MAX_GAUSS_POINTS: u32 = GAUSS_LEGENDRE.len() as u32;

#[derive(Clone, Debug)]
struct ReferencePoint {
    weight: f64,
    phi: [f64; NODES_PER_ELEMENT],
    dphi: [[f64; 2]; NODES_PER_ELEMENT],
}

/// Basis values at one quadrature point of a physical element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointValues {
    /// Basis function values.
    pub phi: [f64; NODES_PER_ELEMENT],
    /// Physical gradients `[d/dx, d/dy]` of each basis function.
    pub grad: [[f64; 2]; NODES_PER_ELEMENT],
    /// Quadrature weight times Jacobian determinant.
    pub jxw: f64,
}

/// Bilinear quadrilateral basis with a tensor-product Gauss rule.
#[derive(Clone, Debug)]
pub struct BilinearQuad {
    points_per_xi: u32,
    points: Vec<ReferencePoint>,
}

fn lagrange(a: usize, xi: f64) -> (f64, f64) {
    if a == 0 {
        (1.0 - xi, -1.0)
    } else {
        (xi, 1.0)
    }
}

impl BilinearQuad {
    /// Basis with `points_per_xi` Gauss points per direction (1 to 4).
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] if `points_per_xi` is outside the
    /// supported range.
    pub fn new(points_per_xi: u32) -> Result<Self, ConfigError> {
        if points_per_xi == 0 || points_per_xi > MAX_GAUSS_POINTS {
            return Err(ConfigError::InvalidParameter {
                name: "gauss_points".into(),
                value: f64::from(points_per_xi),
            });
        }
        let rule = GAUSS_LEGENDRE[(points_per_xi - 1) as usize];
        let mut points = Vec::with_capacity(rule.len() * rule.len());
        for &(s2, w2) in rule {
            for &(s1, w1) in rule {
                let xi = [0.5 * (s1 + 1.0), 0.5 * (s2 + 1.0)];
                let mut phi = [0.0; NODES_PER_ELEMENT];
                let mut dphi = [[0.0; 2]; NODES_PER_ELEMENT];
                for k in 0..NODES_PER_ELEMENT {
                    let (l1, d1) = lagrange(k % 2, xi[0]);
                    let (l2, d2) = lagrange(k / 2, xi[1]);
                    phi[k] = l1 * l2;
                    dphi[k] = [d1 * l2, l1 * d2];
                }
                points.push(ReferencePoint {
                    weight: 0.25 * w1 * w2,
                    phi,
                    dphi,
                });
            }
        }
        Ok(Self {
            points_per_xi,
            points,
        })
    }

    /// Gauss points per xi direction.
    pub fn points_per_xi(&self) -> u32 {
        self.points_per_xi
    }

    /// Total quadrature points per element.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Evaluate the basis on a physical element with the given node coordinates.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMesh`] if the element is degenerate or inverted
    /// at any quadrature point.
    pub fn evaluate(
        &self,
        coords: &[[f64; 2]; NODES_PER_ELEMENT],
    ) -> Result<SmallVec<[PointValues; 16]>, ConfigError> {
        let mut out = SmallVec::with_capacity(self.points.len());
        for p in &self.points {
            // J[r][c] = d x_r / d xi_c
            let mut j = [[0.0; 2]; 2];
            for k in 0..NODES_PER_ELEMENT {
                for r in 0..2 {
                    for c in 0..2 {
                        j[r][c] += coords[k][r] * p.dphi[k][c];
                    }
                }
            }
            let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
            if !(det.is_finite() && det > 0.0) {
                return Err(ConfigError::InvalidMesh {
                    reason: format!("element with Jacobian determinant {det} is degenerate or inverted"),
                });
            }
            let inv = [
                [j[1][1] / det, -j[0][1] / det],
                [-j[1][0] / det, j[0][0] / det],
            ];
            let mut grad = [[0.0; 2]; NODES_PER_ELEMENT];
            for k in 0..NODES_PER_ELEMENT {
                for r in 0..2 {
                    grad[k][r] = inv[0][r] * p.dphi[k][0] + inv[1][r] * p.dphi[k][1];
                }
            }
            out.push(PointValues {
                phi: p.phi,
                grad,
                jxw: p.weight * det,
            });
        }
        Ok(out)
    }
}
