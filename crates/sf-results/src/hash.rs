//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};
use sf_project::Project;

/// SHA-256 of the project's canonical JSON.
pub fn project_hash(project: &Project) -> String {
    let mut hasher = Sha256::new();
    let project_json = serde_json::to_string(project).unwrap_or_default();
    hasher.update(project_json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Run id: the project content hashed together with the start timestamp, so
/// repeated runs of one project get distinct directories.
pub fn compute_run_id(project: &Project, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_hash(project).as_bytes());
    hasher.update(timestamp.as_bytes());
    format!("{:x}", hasher.finalize())
}
