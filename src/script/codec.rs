use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{name_with_extension, strip_extension, ProjectFileMap, ScriptInfo};
use crate::error::SyncError;

/// Wire shape of a script project: `{"files": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireProject {
    pub files: Vec<WireFile>,
}

/// One wire record. An absent optional field means "unchanged", never "empty".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result of decoding a project payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Parsed(ProjectFileMap),
    /// The payload could not be decoded; callers usually treat this as an
    /// empty project.
    Malformed { reason: String },
}

impl DecodeOutcome {
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeOutcome::Malformed { .. })
    }

    /// Files of a parsed payload, or an empty map when malformed
    pub fn into_files(self) -> ProjectFileMap {
        match self {
            DecodeOutcome::Parsed(files) => files,
            DecodeOutcome::Malformed { .. } => ProjectFileMap::new(),
        }
    }

    /// Files of a parsed payload; malformed payloads become `MalformedResponse`
    pub fn into_result(self) -> Result<ProjectFileMap, SyncError> {
        match self {
            DecodeOutcome::Parsed(files) => Ok(files),
            DecodeOutcome::Malformed { reason } => Err(SyncError::MalformedResponse(reason)),
        }
    }
}

/// Decode a project payload into files keyed by full local name.
///
/// A record without a name is keyed by its document id instead, so every
/// record the server sent has an entry. Never fails: a payload that does not
/// parse, names an unknown type tag, holds a record with neither name nor id,
/// or maps two records to the same key is logged and reported as `Malformed`.
pub fn decode(json: &str) -> DecodeOutcome {
    match decode_files(json) {
        Ok(files) => DecodeOutcome::Parsed(files),
        Err(reason) => {
            tracing::warn!("failed to decode script project payload: {}", reason);
            DecodeOutcome::Malformed { reason }
        }
    }
}

fn decode_files(json: &str) -> Result<ProjectFileMap, String> {
    let wire: WireProject = serde_json::from_str(json).map_err(|e| e.to_string())?;

    let mut files = ProjectFileMap::new();
    for record in wire.files {
        let key_base = match (record.name.as_deref(), record.id.as_deref()) {
            (Some(name), _) => name,
            (None, Some(id)) => {
                tracing::debug!("{} record {} has no name, keying it by id", record.file_type, id);
                id
            }
            (None, None) => {
                return Err(format!("{} record has neither name nor id", record.file_type))
            }
        };
        let full_name =
            name_with_extension(key_base, &record.file_type).map_err(|e| e.to_string())?;
        if files.contains_key(&full_name) {
            return Err(format!("more than one record maps to {}", full_name));
        }
        let info = ScriptInfo::new(record.name, record.id, record.file_type, record.source);
        files.insert(full_name, info);
    }

    Ok(files)
}

/// Encode `files` for an update call.
///
/// Every file is listed, so anything missing from `files` is deleted
/// remotely. `name` and `source` are sent only for files whose bare name (or
/// full name) is in `modified`, and always for files without a document id.
pub fn encode(files: &ProjectFileMap, modified: &BTreeSet<String>) -> Result<String, SyncError> {
    let mut wire = WireProject::default();

    for (full_name, info) in files {
        let bare_name = strip_extension(full_name);
        let changed = !info.is_synced()
            || modified.contains(bare_name)
            || modified.contains(full_name.as_str());

        let mut record = WireFile {
            id: info.document_id().map(str::to_string),
            file_type: info.file_type().to_string(),
            ..WireFile::default()
        };
        if changed {
            record.name = Some(info.import_name().unwrap_or(bare_name).to_string());
            record.source = info.contents().map(str::to_string);
        }
        wire.files.push(record);
    }

    serde_json::to_string(&wire).map_err(SyncError::Encode)
}
