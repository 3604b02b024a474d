//! Error types for sparse solver operations.

use thiserror::Error;
use wn_core::WnError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// A non-positive pivot appeared in column `equation` (1-based).
    #[error("Ill-conditioned system at equation {equation}")]
    IllConditioned { equation: usize },

    #[error("Invalid topology: {what}")]
    InvalidTopology { what: String },

    #[error("Dimension mismatch: {what} (expected {expected}, got {got})")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for WnError {
    fn from(e: SolverError) -> Self {
        WnError::Invariant {
            what: e.to_string(),
        }
    }
}
