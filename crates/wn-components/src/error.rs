//! Error types for component operations.

use thiserror::Error;
use wn_core::WnError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid pump curve {curve}: {reason}")]
    InvalidCurve { curve: String, reason: &'static str },
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl From<ComponentError> for WnError {
    fn from(e: ComponentError) -> Self {
        match e {
            ComponentError::NonPhysical { what } => WnError::InvalidArg { what },
            ComponentError::InvalidArg { what } => WnError::InvalidArg { what },
            ComponentError::InvalidCurve { .. } => WnError::Invariant {
                what: e.to_string(),
            },
        }
    }
}
