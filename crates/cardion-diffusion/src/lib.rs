//! The diffusion half of the monodomain splitting step.
//!
//! Solves `Am Cm dV/dt = div(sigma grad V)` for one backward-Euler step on
//! bilinear quadrilaterals:
//!
//! ```text
//! (Mw/dt + K) V^{n+1} = (Mw/dt) V^n + f_N
//! ```
//!
//! with `Mw_ij = int Am Cm N_i N_j` and `K_ij = int grad N_i . sigma grad N_j`.
//! Material values are interpolated at quadrature points from the nodal
//! `materials` field. Dirichlet rows and columns are eliminated
//! symmetrically, so the system stays symmetric positive definite and is
//! solved by Jacobi-preconditioned conjugate gradients distributed over
//! partitions.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod assembly;
pub mod cg;
pub mod solver;
pub mod sparse;

pub use cg::{SolveStats, SolverSettings};
pub use solver::{DiffusionError, DiffusionFields, DiffusionSolver};
pub use sparse::CsrMatrix;
