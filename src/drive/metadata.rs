use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file record as returned by the Drive v2 files API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<ParentReference>,
    /// Export MIME type -> download URL
    #[serde(default)]
    pub export_links: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub id: String,
    #[serde(default)]
    pub is_root: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Labels {
    #[serde(default)]
    pub trashed: bool,
}

impl FileMetadata {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mime_type: mime_type.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parents.push(ParentReference {
            id: parent_id.into(),
            is_root: false,
        });
        self
    }

    /// Download URL for the export format `mime_type`, if the record offers one
    pub fn export_link(&self, mime_type: &str) -> Option<&str> {
        self.export_links.get(mime_type).map(String::as_str)
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(|p| p.id.as_str())
    }
}
