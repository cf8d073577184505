use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sync state of a local workspace, stored in `.script-sync/state.yaml`
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceState {
    /// Remote id of the script project document
    #[serde(default)]
    pub file_id: String,

    /// When the workspace last matched the remote project
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,

    /// Full file name -> what was last pulled or pushed
    #[serde(default)]
    pub files: BTreeMap<String, TrackedFile>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Remote id; absent until the file has been pushed once
    #[serde(default)]
    pub document_id: Option<String>,
    /// Remote type tag
    pub file_type: String,
    /// SHA-256 of the contents at last sync (hex)
    pub sha256: String,
}
