//! Shared application service layer for waternet.
//!
//! Runs a network file end to end (load, compile, hydraulics, quality,
//! persisted run) and answers queries against stored runs. The CLI is a thin
//! shell over this crate.

pub mod error;
pub mod network_service;
pub mod progress;
pub mod query;
pub mod run_service;

pub use error::{AppError, AppResult};
pub use network_service::{NetworkSummary, compile_network, load_network, summarize};
pub use progress::{RunProgressEvent, RunStage};
pub use query::{RunRef, link_values_at, node_values_at};
pub use run_service::{
    RunHandle, RunOptions, RunRequest, RunResponse, RunTimingSummary, list_runs, run,
    run_with_progress,
};
