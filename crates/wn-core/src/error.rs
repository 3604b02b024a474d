use thiserror::Error;

pub type WnResult<T> = Result<T, WnError>;

/// Errors shared by every waternet crate; the higher layers convert into it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WnError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Network invariant violated: {what}")]
    Invariant { what: String },
}
