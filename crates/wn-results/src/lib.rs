//! wn-results: binary step streams and run storage.
//!
//! A run directory holds:
//! - `hydraulics.bin`: the hydraulic step stream
//! - `quality.bin`: the quality step stream (when quality was simulated)
//! - `manifest.json`: what was run and when
//!
//! Both streams are little-endian and strictly sequential.

pub mod hash;
pub mod hydraulic;
pub mod quality;
pub mod store;
pub mod types;

mod codec;

pub use hash::compute_run_id;
pub use hydraulic::{
    HYDRAULIC_FORMAT_VERSION, HydraulicHeader, HydraulicStep, HydraulicStreamReader,
    HydraulicStreamWriter,
};
pub use quality::{QualityPeriod, QualityStreamReader, QualityStreamWriter};
pub use store::{RunStore, StagedRun};
pub use types::*;

use std::path::PathBuf;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read results: {0}")]
    Read(std::io::Error),

    #[error("Cannot write results: {0}")]
    Write(std::io::Error),

    #[error("Results do not match network: {what}")]
    Mismatch { what: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },
}

impl ResultsError {
    /// Numeric error code reported to callers.
    pub fn code(&self) -> i32 {
        match self {
            ResultsError::Open { .. } | ResultsError::RunNotFound { .. } => 302,
            ResultsError::Read(_) | ResultsError::Json(_) => 303,
            ResultsError::Mismatch { .. } => 306,
            ResultsError::Write(_) => 308,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        let io = || std::io::Error::other("x");
        assert_eq!(ResultsError::Read(io()).code(), 303);
        assert_eq!(ResultsError::Write(io()).code(), 308);
        assert_eq!(
            ResultsError::Open {
                path: "a".into(),
                source: io()
            }
            .code(),
            302
        );
    }
}
