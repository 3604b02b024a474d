//! Error types for control operations.

use thiserror::Error;
use wn_core::WnError;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A control or rule refers to an object outside the network.
    #[error("Invalid reference in {owner}: {what}")]
    InvalidReference { owner: String, what: String },
}

impl From<ControlError> for WnError {
    fn from(e: ControlError) -> Self {
        WnError::Invariant {
            what: e.to_string(),
        }
    }
}
