//! Distributed Jacobi-preconditioned conjugate gradients.
//!
//! Each partition holds the owned rows of the system and a local vector
//! spanning owned and halo nodes. Halo entries of the search direction are
//! refreshed before every matrix-vector product; dot products are summed
//! over owned entries and reduced across partitions in rank order, so every
//! partition takes identical iterations.

use crate::sparse::CsrMatrix;
use cardion_core::{ConfigError, ExchangeError, StepError};
use cardion_exchange::PartitionExchange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conjugate-gradient settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Relative residual `||r|| / ||b||` at which the solve stops.
    pub tolerance: f64,
    /// Iteration limit.
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

impl SolverSettings {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSolver`] if the tolerance is not in `(0, 1)` or
    /// the iteration limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ConfigError::InvalidSolver {
                reason: format!("tolerance {} must be in (0, 1)", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSolver {
                reason: "max_iterations must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Outcome of a converged solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveStats {
    /// Iterations performed.
    pub iterations: u32,
    /// Final relative residual.
    pub residual: f64,
}

/// Failure inside the linear solve.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CgError {
    /// Not converged or non-finite.
    #[error(transparent)]
    Numerical(#[from] StepError),
    /// A collective failed.
    #[error(transparent)]
    Communication(#[from] ExchangeError),
}

fn dot(a: &[f64], b: &[f64], owned: usize) -> f64 {
    a[..owned].iter().zip(&b[..owned]).map(|(x, y)| x * y).sum()
}

/// Solve `A x = b` for the owned rows.
///
/// `x` spans local nodes and holds the initial guess on entry; on return its
/// owned entries hold the solution. `b` and `inv_diag` span owned rows. If
/// `||b|| = 0` the solution is exactly zero.
pub fn solve(
    a: &CsrMatrix,
    inv_diag: &[f64],
    b: &[f64],
    x: &mut [f64],
    exchange: &mut PartitionExchange,
    settings: &SolverSettings,
) -> Result<SolveStats, CgError> {
    let owned = a.rows();
    let b_norm = exchange.all_reduce_sum(dot(b, b, owned))?.sqrt();
    if b_norm == 0.0 {
        x.fill(0.0);
        return Ok(SolveStats::default());
    }

    let mut q = vec![0.0; owned];
    exchange.update_halo(x)?;
    a.mul_vec(x, &mut q);
    let mut r: Vec<f64> = b.iter().zip(&q).map(|(bi, qi)| bi - qi).collect();
    let mut z: Vec<f64> = r.iter().zip(inv_diag).map(|(ri, di)| ri * di).collect();
    let mut p = vec![0.0; x.len()];
    p[..owned].copy_from_slice(&z);

    let sums = exchange.all_reduce_sum_many(&[dot(&r, &r, owned), dot(&r, &z, owned)])?;
    let (mut rr, mut rz) = (sums[0], sums[1]);
    let mut iterations = 0;

    loop {
        let residual = rr.sqrt() / b_norm;
        if !residual.is_finite() {
            return Err(StepError::SolverDiverged {
                iterations,
                residual,
            }
            .into());
        }
        if residual <= settings.tolerance {
            tracing::trace!(iterations, residual, "cg converged");
            return Ok(SolveStats {
                iterations,
                residual,
            });
        }
        if iterations >= settings.max_iterations {
            tracing::warn!(iterations, residual, "cg iteration limit reached");
            return Err(StepError::SolverDiverged {
                iterations,
                residual,
            }
            .into());
        }

        exchange.update_halo(&mut p)?;
        a.mul_vec(&p, &mut q);
        let pq = exchange.all_reduce_sum(dot(&p, &q, owned))?;
        let alpha = rz / pq;
        for i in 0..owned {
            x[i] += alpha * p[i];
            r[i] -= alpha * q[i];
            z[i] = r[i] * inv_diag[i];
        }
        let sums = exchange.all_reduce_sum_many(&[dot(&r, &r, owned), dot(&r, &z, owned)])?;
        rr = sums[0];
        let rz_next = sums[1];
        let beta = rz_next / rz;
        rz = rz_next;
        for i in 0..owned {
            p[i] = z[i] + beta * p[i];
        }
        iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardion_core::PartitionId;
    use cardion_exchange::LocalCommunicator;
    use cardion_mesh::{Decomposition, RectMeshBuilder};

    fn local_exchange() -> PartitionExchange {
        let mesh = RectMeshBuilder::new(1.0, 1.0, 1, 1).build().unwrap();
        let dec = Decomposition::calculated(&mesh, 1).unwrap();
        let part = dec.partition(&mesh, PartitionId(0)).unwrap();
        PartitionExchange::new(&part, Box::new(LocalCommunicator)).unwrap()
    }

    /// 1D Laplacian plus identity: tridiag(-1, 3, -1).
    fn tridiag(n: u32) -> CsrMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 3.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n as usize, n as usize, &t)
    }

    #[test]
    fn solves_spd_system() {
        let a = tridiag(4);
        let inv: Vec<f64> = a.diagonal().iter().map(|d| 1.0 / d).collect();
        let x_true = [1.0, -2.0, 0.5, 4.0];
        let mut b = vec![0.0; 4];
        a.mul_vec(&x_true, &mut b);
        let mut x = vec![0.0; 4];
        let mut ex = local_exchange();
        let stats = solve(&a, &inv, &b, &mut x, &mut ex, &SolverSettings::default()).unwrap();
        assert!(stats.iterations <= 4);
        for (xi, ti) in x.iter().zip(x_true) {
            assert!((xi - ti).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let a = tridiag(3);
        let mut x = vec![5.0; 3];
        let mut ex = local_exchange();
        let stats = solve(&a, &[1.0; 3], &[0.0; 3], &mut x, &mut ex, &SolverSettings::default())
            .unwrap();
        assert_eq!(x, vec![0.0; 3]);
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn exact_initial_guess_needs_no_iterations() {
        let a = tridiag(3);
        let x_true = [1.0, 1.0, 1.0];
        let mut b = vec![0.0; 3];
        a.mul_vec(&x_true, &mut b);
        let mut x = x_true.to_vec();
        let mut ex = local_exchange();
        let stats = solve(&a, &[1.0; 3], &b, &mut x, &mut ex, &SolverSettings::default()).unwrap();
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn iteration_limit_is_a_numerical_failure() {
        let a = tridiag(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let mut ex = local_exchange();
        let settings = SolverSettings {
            tolerance: 1e-14,
            max_iterations: 2,
        };
        let err = solve(&a, &[1.0; 20], &b, &mut x, &mut ex, &settings).unwrap_err();
        assert!(matches!(
            err,
            CgError::Numerical(StepError::SolverDiverged { iterations: 2, .. })
        ));
    }

    #[test]
    fn settings_validation() {
        assert!(SolverSettings::default().validate().is_ok());
        let bad = SolverSettings {
            tolerance: 0.0,
            max_iterations: 10,
        };
        assert!(bad.validate().is_err());
    }
}
