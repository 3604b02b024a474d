//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};
use wn_model::NetworkDef;

/// Run id: hex SHA-256 over the network description, the quality switch and the solver version.
pub fn compute_run_id(network: &NetworkDef, with_quality: bool, solver_version: &str) -> String {
    let mut hasher = Sha256::new();

    let network_json = serde_json::to_string(network).unwrap_or_default();
    hasher.update(network_json.as_bytes());
    hasher.update([u8::from(with_quality)]);
    hasher.update(solver_version.as_bytes());

    format!("{:x}", hasher.finalize())
}
