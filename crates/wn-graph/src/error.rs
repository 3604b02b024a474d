//! Graph-specific error types.

use thiserror::Error;
use wn_core::{LinkId, NodeId, WnError};

/// Graph construction and validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Link {link} refers to non-existent node {node}")]
    InvalidNodeRef { link: LinkId, node: NodeId },

    #[error("Link {link} starts and ends at node {node}")]
    SelfLoop { link: LinkId, node: NodeId },

    #[error("Duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },

    #[error("Unknown {what} '{name}'")]
    NameNotFound { what: &'static str, name: String },
}

impl From<GraphError> for WnError {
    fn from(err: GraphError) -> Self {
        WnError::Invariant {
            what: err.to_string(),
        }
    }
}
