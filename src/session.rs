//! Connection lifecycle and project read/write against the remote store.
//!
//! The write path overwrites the whole project document. There is no version
//! or ETag precondition: avoiding concurrent edits is the caller's job.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    auth::{Credential, CredentialProvider},
    drive::{DriveClient, DriveEndpoints, FileMetadata, FolderCache, RemoteStore, FOLDER_MIME_TYPE},
    error::{classify_write_failure, SyncError},
    script::{self, DecodeOutcome, ProjectFileMap, ScriptInfo, ScriptProject},
};

/// Builds a remote store client from a credential
pub trait Connector: Send + Sync {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn RemoteStore>, SyncError>;
}

impl<F> Connector for F
where
    F: Fn(&Credential) -> Result<Arc<dyn RemoteStore>, SyncError> + Send + Sync,
{
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn RemoteStore>, SyncError> {
        self(credential)
    }
}

/// Connects to the Drive HTTP API
pub struct DriveConnector {
    endpoints: DriveEndpoints,
}

impl DriveConnector {
    pub fn new(endpoints: DriveEndpoints) -> Self {
        Self { endpoints }
    }
}

impl Connector for DriveConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn RemoteStore>, SyncError> {
        Ok(Arc::new(DriveClient::new(self.endpoints.clone(), credential)?))
    }
}

enum Connection {
    Disconnected,
    Connected(Arc<dyn RemoteStore>),
}

/// A sync session: one credential source, one lazily-created store client.
///
/// Only the connect-or-reuse decision is serialized. Once connected, reads
/// and writes from several threads run concurrently.
pub struct SyncSession {
    credentials: Box<dyn CredentialProvider>,
    connector: Box<dyn Connector>,
    project_mime_type: String,
    folder_mime_type: String,
    connection: Mutex<Connection>,
}

impl SyncSession {
    pub fn new(
        credentials: Box<dyn CredentialProvider>,
        connector: Box<dyn Connector>,
        project_mime_type: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            connector,
            project_mime_type: project_mime_type.into(),
            folder_mime_type: FOLDER_MIME_TYPE.to_string(),
            connection: Mutex::new(Connection::Disconnected),
        }
    }

    /// Use `folder_mime_type` to recognize folders when building folder caches
    pub fn with_folder_mime_type(mut self, folder_mime_type: impl Into<String>) -> Self {
        self.folder_mime_type = folder_mime_type.into();
        self
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.connection.lock(), Connection::Connected(_))
    }

    /// Return the live store client, logging in and connecting first if needed
    pub fn ensure_connection(&self) -> Result<Arc<dyn RemoteStore>, SyncError> {
        let mut connection = self.connection.lock();
        if let Connection::Connected(store) = &*connection {
            return Ok(Arc::clone(store));
        }

        if !self.credentials.is_logged_in() {
            tracing::info!("not logged in, requesting credentials");
            self.credentials.log_in(true)?;
        }
        let credential = self.credentials.credential()?;
        let store = self.connector.connect(&credential)?;
        *connection = Connection::Connected(Arc::clone(&store));

        tracing::info!("connected to remote store");
        Ok(store)
    }

    /// Drop the current store client; the next call reconnects
    pub fn on_logout(&self) {
        *self.connection.lock() = Connection::Disconnected;
        tracing::info!("disconnected from remote store");
    }

    /// Forget the stored credential and disconnect
    pub fn log_out(&self) -> Result<(), SyncError> {
        self.credentials.log_out()?;
        self.on_logout();
        Ok(())
    }

    /// Read a project. An undecodable payload yields a project with no files.
    pub fn read_project(&self, file_id: &str) -> Result<ScriptProject, SyncError> {
        let outcome = self.fetch_project(file_id)?;
        if outcome.is_malformed() {
            tracing::warn!("project {} could not be decoded, treating it as empty", file_id);
        }
        Ok(ScriptProject::new(file_id, outcome.into_files()))
    }

    /// Read a project, failing with `MalformedResponse` on an undecodable payload
    pub fn read_project_strict(&self, file_id: &str) -> Result<ScriptProject, SyncError> {
        let files = self.fetch_project(file_id)?.into_result()?;
        Ok(ScriptProject::new(file_id, files))
    }

    fn fetch_project(&self, file_id: &str) -> Result<DecodeOutcome, SyncError> {
        let store = self.ensure_connection()?;
        let metadata = store.get_metadata(file_id)?;
        self.resolve_project(store.as_ref(), &metadata)
    }

    /// Download and decode the project described by `metadata`
    fn resolve_project(
        &self,
        store: &dyn RemoteStore,
        metadata: &FileMetadata,
    ) -> Result<DecodeOutcome, SyncError> {
        let link = metadata
            .export_link(&self.project_mime_type)
            .ok_or_else(|| {
                SyncError::MalformedResponse(format!(
                    "document {} has no {} export link",
                    metadata.id, self.project_mime_type
                ))
            })?;

        let body = store.download(link)?;
        Ok(script::decode(&body))
    }

    /// Write `project` back to the remote store.
    ///
    /// `modified` holds the names (bare or full) of files whose name/source
    /// changed; files without a document id are always sent in full. Returns
    /// the previously unsynced files, keyed by name, now carrying their
    /// server-assigned ids.
    pub fn write_project(
        &self,
        project: &ScriptProject,
        modified: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, ScriptInfo>, SyncError> {
        let store = self.ensure_connection()?;
        let body = script::encode(&project.files, modified)?;

        tracing::info!(
            "writing project {} ({} file(s), {} modified)",
            project.file_id,
            project.files.len(),
            modified.len()
        );
        let updated = store
            .update_content(&project.file_id, &self.project_mime_type, &body)
            .map_err(|e| match e {
                SyncError::Transport(t) => classify_write_failure(t),
                other => other,
            })?;

        let written = self.resolve_project(store.as_ref(), &updated)?.into_result()?;
        reconcile(&project.files, &written)
    }

    /// Build a folder hierarchy snapshot for `leaf_query`
    pub fn build_folder_cache(&self, leaf_query: &str) -> Result<FolderCache, SyncError> {
        let store = self.ensure_connection()?;
        FolderCache::build_with_folder_type(store.as_ref(), leaf_query, &self.folder_mime_type)
    }
}

/// Match files that had no id before the write to their post-write records
fn reconcile(
    before: &ProjectFileMap,
    after: &ProjectFileMap,
) -> Result<BTreeMap<String, ScriptInfo>, SyncError> {
    let mut assigned = BTreeMap::new();

    for (name, info) in before.iter().filter(|(_, info)| !info.is_synced()) {
        let document_id = after
            .get(name)
            .and_then(ScriptInfo::document_id)
            .ok_or_else(|| {
                SyncError::ProtocolViolation(format!(
                    "new file {} has no id after the write",
                    name
                ))
            })?;

        let import_name = info
            .import_name()
            .or_else(|| after.get(name).and_then(ScriptInfo::import_name))
            .map(str::to_string);
        let synced = ScriptInfo::new(
            import_name,
            Some(document_id.to_string()),
            info.file_type(),
            info.contents().map(str::to_string),
        );

        tracing::debug!("{} assigned id {}", name, document_id);
        assigned.insert(name.clone(), synced);
    }

    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, ScriptInfo)]) -> ProjectFileMap {
        entries
            .iter()
            .map(|(n, i)| (n.to_string(), i.clone()))
            .collect()
    }

    #[test]
    fn test_reconcile_picks_up_new_ids() {
        let before = files(&[
            (
                "Code.gs",
                ScriptInfo::unsynced("Code", "server_js", "x").with_document_id("A"),
            ),
            ("foo.html", ScriptInfo::unsynced("foo", "html", "<p>hi</p>")),
        ]);
        let after = files(&[
            (
                "Code.gs",
                ScriptInfo::unsynced("Code", "server_js", "x").with_document_id("A"),
            ),
            (
                "foo.html",
                ScriptInfo::unsynced("foo", "html", "<p>hi</p>").with_document_id("X42"),
            ),
        ]);

        let assigned = reconcile(&before, &after).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(
            assigned["foo.html"],
            ScriptInfo::unsynced("foo", "html", "<p>hi</p>").with_document_id("X42")
        );
    }

    #[test]
    fn test_reconcile_missing_counterpart_is_violation() {
        let before = files(&[("foo.html", ScriptInfo::unsynced("foo", "html", ""))]);
        let err = reconcile(&before, &ProjectFileMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::ProtocolViolation(_)));
    }

    #[test]
    fn test_reconcile_counterpart_without_id_is_violation() {
        let before = files(&[("foo.html", ScriptInfo::unsynced("foo", "html", ""))]);
        let after = files(&[("foo.html", ScriptInfo::unsynced("foo", "html", ""))]);
        assert!(matches!(
            reconcile(&before, &after),
            Err(SyncError::ProtocolViolation(_))
        ));
    }
}
