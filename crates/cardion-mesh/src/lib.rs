//! Meshes and their decomposition for the cardion monodomain engine.
//!
//! This crate provides the static spatial description the engine runs on:
//!
//! - [`Mesh`]: node positions and 4-node quadrilateral connectivity, built
//!   for rectangular domains by [`RectMeshBuilder`].
//! - [`BilinearQuad`]: bilinear Lagrange basis with Gauss-Legendre
//!   quadrature, used by diffusion assembly.
//! - [`Decomposition`] and [`Partition`]: node ownership across workers,
//!   halo sets and per-peer exchange lists.
//! - [`BoundaryConditions`]: Dirichlet values and integrated Neumann fluxes.
//!
//! Everything here is immutable once built.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod basis;
pub mod boundary;
pub mod decomposition;
pub mod mesh;
pub mod partition;

pub use basis::{BilinearQuad, PointValues};
pub use boundary::BoundaryConditions;
pub use decomposition::Decomposition;
pub use mesh::{GridShape, Mesh, RectMeshBuilder};
pub use partition::{HaloLink, Partition};
