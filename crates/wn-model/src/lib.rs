//! wn-model: network description format, validation and compilation.
//!
//! A network is described in YAML or JSON (`NetworkDef`), validated, and
//! compiled into an immutable `Network` in internal units.

pub mod compile;
pub mod controls;
pub mod network;
pub mod options;
pub mod schema;
pub mod validate;

pub use compile::compile;
pub use controls::*;
pub use network::*;
pub use options::*;
pub use schema::*;
pub use validate::{ValidationError, validate_network};

use std::path::Path;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Topology error: {0}")]
    Graph(#[from] wn_graph::GraphError),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn from_yaml_str(content: &str) -> ModelResult<NetworkDef> {
    let net: NetworkDef = serde_yaml::from_str(content)?;
    validate_network(&net)?;
    Ok(net)
}

pub fn from_json_str(content: &str) -> ModelResult<NetworkDef> {
    let net: NetworkDef = serde_json::from_str(content)?;
    validate_network(&net)?;
    Ok(net)
}

pub fn load_yaml(path: &Path) -> ModelResult<NetworkDef> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn load_json(path: &Path) -> ModelResult<NetworkDef> {
    let content = std::fs::read_to_string(path)?;
    from_json_str(&content)
}

/// Load a network file, choosing the format by extension (`.yaml`/`.yml` or `.json`).
pub fn load(path: &Path) -> ModelResult<NetworkDef> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => load_yaml(path),
        Some("json") => load_json(path),
        other => Err(ModelError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}
