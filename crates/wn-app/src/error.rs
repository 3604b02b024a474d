//! Error types for the wn-app service layer.

use wn_model::ModelError;
use wn_results::ResultsError;
use wn_sim::SimError;

/// Application error wrapping the backend crates' errors.
///
/// Every variant maps to the numeric code reported by the CLI, see
/// [`AppError::code`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),
}

/// Result type for wn-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// 110 ill-conditioned, 111 unbalanced, 200 invalid configuration,
    /// 30x results I/O, 1 cancelled.
    pub fn code(&self) -> i32 {
        match self {
            AppError::Model(ModelError::Io(_)) => 302,
            AppError::Model(_) | AppError::InvalidConfig(_) => 200,
            AppError::Simulation(e) => e.code(),
            AppError::Results(e) => e.code(),
        }
    }
}

impl From<wn_controls::ControlError> for AppError {
    fn from(err: wn_controls::ControlError) -> Self {
        AppError::Simulation(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_source_error() {
        assert_eq!(AppError::InvalidConfig("x".into()).code(), 200);
        assert_eq!(AppError::from(SimError::Unbalanced { time: 0 }).code(), 111);
        assert_eq!(AppError::from(SimError::Cancelled { time: 60 }).code(), 1);
        let missing = ModelError::Io(std::io::Error::other("gone"));
        assert_eq!(AppError::from(missing).code(), 302);
        let results = ResultsError::RunNotFound {
            run_id: "abc".into(),
        };
        assert_eq!(AppError::from(results).code(), 302);
    }
}
