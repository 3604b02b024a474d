//! Sparse symmetric solver for the nodal head equations.
//!
//! The network's junction admittance matrix is symmetric positive definite.
//! `SparseMatrix::build` computes a minimum-degree elimination order and the
//! non-zero pattern of the Cholesky factor once per topology;
//! `SparseMatrix::factor_and_solve` then factors and solves in place on every
//! hydraulic iteration.

pub mod error;
pub mod factor;
pub mod ordering;

pub use error::{SolverError, SolverResult};
pub use ordering::SparseMatrix;
