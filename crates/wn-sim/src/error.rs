//! Error types for simulation runs.

use thiserror::Error;
use wn_results::ResultsError;
use wn_solver::SolverError;

/// Errors that end a simulation run.
#[derive(Error, Debug)]
pub enum SimError {
    /// No control valve next to the failing equation could absorb the singularity.
    #[error("Network is ill-conditioned at node {node} (t = {time} s)")]
    IllConditioned { node: String, time: i64 },

    #[error("Network is unbalanced at t = {time} s")]
    Unbalanced { time: i64 },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Results I/O failed: {0}")]
    Io(#[from] ResultsError),

    #[error("Run cancelled at t = {time} s")]
    Cancelled { time: i64 },

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Numeric error code reported to callers.
    pub fn code(&self) -> i32 {
        match self {
            SimError::IllConditioned { .. } => 110,
            SimError::Unbalanced { .. } => 111,
            SimError::InvalidConfig { .. } | SimError::Solver(_) => 200,
            SimError::Io(e) => e.code(),
            SimError::Cancelled { .. } => 1,
        }
    }
}

impl From<wn_components::ComponentError> for SimError {
    fn from(e: wn_components::ComponentError) -> Self {
        SimError::InvalidConfig {
            what: e.to_string(),
        }
    }
}

impl From<wn_controls::ControlError> for SimError {
    fn from(e: wn_controls::ControlError) -> Self {
        SimError::InvalidConfig {
            what: e.to_string(),
        }
    }
}
