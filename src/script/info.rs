use std::collections::BTreeMap;

/// Project files keyed by full local file name (with extension), in
/// lexicographic order.
pub type ProjectFileMap = BTreeMap<String, ScriptInfo>;

/// One file of a script project. Values are immutable; updates produce a new
/// `ScriptInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    import_name: Option<String>,
    document_id: Option<String>,
    file_type: String,
    contents: Option<String>,
}

impl ScriptInfo {
    pub fn new(
        import_name: Option<String>,
        document_id: Option<String>,
        file_type: impl Into<String>,
        contents: Option<String>,
    ) -> Self {
        Self {
            import_name,
            document_id,
            file_type: file_type.into(),
            contents,
        }
    }

    /// A file created locally that the remote store has never seen
    pub fn unsynced(
        import_name: impl Into<String>,
        file_type: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self::new(
            Some(import_name.into()),
            None,
            file_type,
            Some(contents.into()),
        )
    }

    /// Base name without extension. `None` leaves the remote name untouched.
    pub fn import_name(&self) -> Option<&str> {
        self.import_name.as_deref()
    }

    /// Remote id. `None` until the file has been written once.
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// File body. `None` leaves the remote contents untouched.
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn is_synced(&self) -> bool {
        self.document_id.is_some()
    }

    /// Copy of this file carrying a server-assigned id
    pub fn with_document_id(&self, document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..self.clone()
        }
    }
}

/// A remote script project document and its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptProject {
    pub file_id: String,
    pub files: ProjectFileMap,
}

impl ScriptProject {
    pub fn new(file_id: impl Into<String>, files: ProjectFileMap) -> Self {
        Self {
            file_id: file_id.into(),
            files,
        }
    }

    /// Files that have no remote identity yet
    pub fn unsynced_files(&self) -> impl Iterator<Item = (&String, &ScriptInfo)> {
        self.files.iter().filter(|(_, info)| !info.is_synced())
    }
}
