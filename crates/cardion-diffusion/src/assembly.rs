//! Weighted mass and stiffness assembly over a partition's elements.

use crate::sparse::CsrMatrix;
use cardion_core::ConfigError;
use cardion_mesh::{BilinearQuad, Partition};

/// Nodal material values over a partition's local nodes.
///
/// Component order follows the `materials` field: surface-to-volume ratio,
/// membrane capacitance, then the diagonal conductivities.
#[derive(Clone, Copy, Debug)]
pub struct Materials<'a> {
    /// Surface-to-volume ratio `Am`.
    pub am: &'a [f64],
    /// Membrane capacitance `Cm`.
    pub cm: &'a [f64],
    /// Conductivity along x.
    pub sigma_11: &'a [f64],
    /// Conductivity along y.
    pub sigma_22: &'a [f64],
}

impl Materials<'_> {
    /// Check that `Am` and `Cm` are positive and conductivities non-negative.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMaterial`] naming the first offending value.
    pub fn validate(&self, partition: &Partition) -> Result<(), ConfigError> {
        let checks: [(&'static str, &[f64], bool); 4] = [
            ("Am", self.am, true),
            ("Cm", self.cm, true),
            ("sigma_11", self.sigma_11, false),
            ("sigma_22", self.sigma_22, false),
        ];
        for (property, values, strictly_positive) in checks {
            for (l, &value) in values.iter().enumerate().take(partition.local_count()) {
                let ok = value.is_finite() && if strictly_positive { value > 0.0 } else { value >= 0.0 };
                if !ok {
                    return Err(ConfigError::InvalidMaterial {
                        property,
                        value,
                        node: partition.global(l as u32),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Assemble `(Mw, K)` for the owned rows of `partition`.
///
/// Both matrices share one sparsity pattern. Contributions to halo rows are
/// discarded; the owning partition assembles them from the same elements.
///
/// # Errors
///
/// [`ConfigError::InvalidMesh`] for degenerate elements.
pub fn assemble(
    partition: &Partition,
    basis: &BilinearQuad,
    materials: &Materials<'_>,
) -> Result<(CsrMatrix, CsrMatrix), ConfigError> {
    let owned = partition.owned_count();
    let local = partition.local_count();
    let positions = partition.positions();
    let mut mass = Vec::with_capacity(partition.connectivity().len() * 16);
    let mut stiffness = Vec::with_capacity(mass.capacity());

    for nodes in partition.connectivity() {
        let coords = nodes.map(|l| positions[l as usize]);
        let points = basis.evaluate(&coords)?;
        let mut me = [[0.0; 4]; 4];
        let mut ke = [[0.0; 4]; 4];
        for p in &points {
            let interp = |field: &[f64]| -> f64 {
                nodes
                    .iter()
                    .zip(&p.phi)
                    .map(|(&l, phi)| phi * field[l as usize])
                    .sum()
            };
            let capacitance = interp(materials.am) * interp(materials.cm);
            let s11 = interp(materials.sigma_11);
            let s22 = interp(materials.sigma_22);
            for a in 0..4 {
                for b in 0..4 {
                    me[a][b] += capacitance * p.phi[a] * p.phi[b] * p.jxw;
                    ke[a][b] += (s11 * p.grad[a][0] * p.grad[b][0]
                        + s22 * p.grad[a][1] * p.grad[b][1])
                        * p.jxw;
                }
            }
        }
        for a in 0..4 {
            let row = nodes[a];
            if (row as usize) >= owned {
                continue;
            }
            for b in 0..4 {
                mass.push((row, nodes[b], me[a][b]));
                stiffness.push((row, nodes[b], ke[a][b]));
            }
        }
    }

    Ok((
        CsrMatrix::from_triplets(owned, local, &mass),
        CsrMatrix::from_triplets(owned, local, &stiffness),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardion_core::PartitionId;
    use cardion_mesh::{Decomposition, RectMeshBuilder};

    fn single(nx: u32, ny: u32) -> Partition {
        let mesh = RectMeshBuilder::new(2.0, 1.0, nx, ny).build().unwrap();
        let dec = Decomposition::calculated(&mesh, 1).unwrap();
        dec.partition(&mesh, PartitionId(0)).unwrap()
    }

    fn uniform(n: usize, am: f64, cm: f64, s: f64) -> [Vec<f64>; 4] {
        [vec![am; n], vec![cm; n], vec![s; n], vec![s; n]]
    }

    #[test]
    fn mass_sums_to_weighted_area_and_stiffness_annihilates_constants() {
        let part = single(4, 3);
        let m = uniform(part.local_count(), 2.0, 1.5, 0.7);
        let mats = Materials {
            am: &m[0],
            cm: &m[1],
            sigma_11: &m[2],
            sigma_22: &m[3],
        };
        let basis = BilinearQuad::new(3).unwrap();
        let (mass, stiff) = assemble(&part, &basis, &mats).unwrap();

        let ones = vec![1.0; part.local_count()];
        let mut y = vec![0.0; part.owned_count()];
        mass.mul_vec(&ones, &mut y);
        let total: f64 = y.iter().sum();
        assert!((total - 2.0 * 1.5 * 2.0).abs() < 1e-12);

        stiff.mul_vec(&ones, &mut y);
        assert!(y.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn stiffness_is_symmetric_with_positive_diagonal() {
        let part = single(3, 2);
        let m = uniform(part.local_count(), 1.0, 1.0, 0.3);
        let mats = Materials {
            am: &m[0],
            cm: &m[1],
            sigma_11: &m[2],
            sigma_22: &m[3],
        };
        let (_, k) = assemble(&part, &BilinearQuad::new(2).unwrap(), &mats).unwrap();
        for i in 0..k.rows() {
            assert!(k.get(i, i as u32) > 0.0);
            for (j, v) in k.row(i) {
                assert!((k.get(j as usize, i as u32) - v).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn validate_rejects_non_positive_capacitance() {
        let part = single(1, 1);
        let mut m = uniform(part.local_count(), 1.0, 1.0, 0.0);
        m[1][2] = 0.0;
        let mats = Materials {
            am: &m[0],
            cm: &m[1],
            sigma_11: &m[2],
            sigma_22: &m[3],
        };
        assert!(matches!(
            mats.validate(&part),
            Err(ConfigError::InvalidMaterial { property: "Cm", .. })
        ));
    }
}
