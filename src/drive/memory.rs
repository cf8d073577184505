use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use super::{FileMetadata, FilePage, RemoteStore, PROJECT_MIME_TYPE};
use crate::{
    error::{SyncError, TransportError},
    script::{WireFile, WireProject},
};

const EXPORT_URL_PREFIX: &str = "memory://export/";
const PAGE_TOKEN_PREFIX: &str = "offset:";

/// In-process remote store.
///
/// Applies project updates with the same partial-update rules as the script
/// service: a record without an id is created with a fresh id, a record
/// without name/source keeps the stored values, and a stored file missing
/// from the request is deleted.
pub struct MemoryStore {
    root_id: String,
    page_size: usize,
    inner: Mutex<Inner>,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    /// Records in insertion order
    files: Vec<FileMetadata>,
    projects: HashMap<String, Vec<WireFile>>,
    next_id: u64,
    fail_list_page: Option<usize>,
    update_failure: Option<(u16, String)>,
    drop_created_files: bool,
    corrupt_exports: bool,
}

impl MemoryStore {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            page_size: 100,
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
            list_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add or replace a metadata record
    pub fn insert_file(&self, meta: FileMetadata) {
        let mut inner = self.inner.lock();
        match inner.files.iter_mut().find(|f| f.id == meta.id) {
            Some(existing) => *existing = meta,
            None => inner.files.push(meta),
        }
    }

    /// Add a script project document holding `files`
    pub fn insert_project(&self, meta: FileMetadata, files: Vec<WireFile>) {
        let mut meta = meta;
        meta.export_links.insert(
            PROJECT_MIME_TYPE.to_string(),
            format!("{}{}", EXPORT_URL_PREFIX, meta.id),
        );
        self.inner.lock().projects.insert(meta.id.clone(), files);
        self.insert_file(meta);
    }

    /// Stored files of project `id`
    pub fn project_files(&self, id: &str) -> Option<Vec<WireFile>> {
        self.inner.lock().projects.get(id).cloned()
    }

    /// Next id handed out is `X<n>`
    pub fn set_next_id(&self, n: u64) {
        self.inner.lock().next_id = n;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

/// Failure injection for tests
impl MemoryStore {
    /// Make the listing call for page `page` (zero-based) fail
    #[doc(hidden)]
    pub fn fail_list_page(&self, page: usize) {
        self.inner.lock().fail_list_page = Some(page);
    }

    /// Make every update fail with `status` and response body `message`
    #[doc(hidden)]
    pub fn fail_updates_with(&self, status: u16, message: impl Into<String>) {
        self.inner.lock().update_failure = Some((status, message.into()));
    }

    /// Accept create requests but never store the created files
    #[doc(hidden)]
    pub fn drop_created_files(&self) {
        self.inner.lock().drop_created_files = true;
    }

    /// Serve unparseable bodies from export links
    #[doc(hidden)]
    pub fn corrupt_exports(&self) {
        self.inner.lock().corrupt_exports = true;
    }
}

impl MemoryStore {
    fn apply_update(inner: &mut Inner, id: &str, request: WireProject) -> Result<(), SyncError> {
        let existing = inner
            .projects
            .get(id)
            .ok_or_else(|| TransportError::with_status(404, format!("File not found: {}", id)))?
            .clone();

        let mut stored = Vec::with_capacity(request.files.len());
        for record in request.files {
            match record.id {
                Some(file_id) => {
                    let mut current = existing
                        .iter()
                        .find(|f| f.id.as_deref() == Some(file_id.as_str()))
                        .cloned()
                        .ok_or_else(|| {
                            TransportError::with_status(
                                400,
                                format!("Unknown script file id: {}", file_id),
                            )
                        })?;
                    current.file_type = record.file_type;
                    if record.name.is_some() {
                        current.name = record.name;
                    }
                    if record.source.is_some() {
                        current.source = record.source;
                    }
                    stored.push(current);
                }
                None => {
                    if record.name.is_none() {
                        return Err(TransportError::with_status(
                            400,
                            "New script files require a name",
                        )
                        .into());
                    }
                    if inner.drop_created_files {
                        continue;
                    }
                    let new_id = format!("X{}", inner.next_id);
                    inner.next_id += 1;
                    stored.push(WireFile {
                        id: Some(new_id),
                        source: record.source.or_else(|| Some(String::new())),
                        ..record
                    });
                }
            }
        }

        inner.projects.insert(id.to_string(), stored);
        Ok(())
    }
}

/// Evaluate a `mimeType='…' [and trashed=false]` query against a record
fn matches_query(query: &str, meta: &FileMetadata) -> Result<bool, SyncError> {
    for clause in query.split(" and ") {
        let clause = clause.trim();
        if let Some(value) = clause
            .strip_prefix("mimeType='")
            .and_then(|rest| rest.strip_suffix('\''))
        {
            let value = value.replace("\\'", "'").replace("\\\\", "\\");
            if meta.mime_type != value {
                return Ok(false);
            }
        } else if clause == "trashed=false" {
            if meta.labels.trashed {
                return Ok(false);
            }
        } else {
            return Err(TransportError::with_status(400, format!("Invalid query: {}", query)).into());
        }
    }
    Ok(true)
}

impl RemoteStore for MemoryStore {
    fn root_id(&self) -> Result<String, SyncError> {
        Ok(self.root_id.clone())
    }

    fn get_metadata(&self, id: &str) -> Result<FileMetadata, SyncError> {
        self.inner
            .lock()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| TransportError::with_status(404, format!("File not found: {}", id)).into())
    }

    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<FilePage, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match page_token {
            Some(token) => token
                .strip_prefix(PAGE_TOKEN_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| {
                    TransportError::with_status(400, format!("Invalid page token: {}", token))
                })?,
            None => 0,
        };

        let inner = self.inner.lock();
        if inner.fail_list_page == Some(offset / self.page_size) {
            return Err(TransportError::with_status(500, "Backend Error").into());
        }

        let mut matching = Vec::new();
        for meta in &inner.files {
            if matches_query(query, meta)? {
                matching.push(meta);
            }
        }

        let end = (offset + self.page_size).min(matching.len());
        let items = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|m| (*m).clone())
            .collect();
        let next_page_token = (end < matching.len()).then(|| format!("{}{}", PAGE_TOKEN_PREFIX, end));

        Ok(FilePage {
            items,
            next_page_token,
        })
    }

    fn update_content(
        &self,
        id: &str,
        mime_type: &str,
        body: &str,
    ) -> Result<FileMetadata, SyncError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock();
        if let Some((status, message)) = &inner.update_failure {
            return Err(TransportError::with_status(*status, message.clone()).into());
        }
        if mime_type != PROJECT_MIME_TYPE {
            return Err(TransportError::with_status(
                400,
                format!("Unsupported upload type: {}", mime_type),
            )
            .into());
        }

        let request: WireProject = serde_json::from_str(body).map_err(|e| {
            TransportError::with_status(400, format!("Invalid JSON payload: {}", e))
        })?;
        Self::apply_update(&mut inner, id, request)?;

        inner
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| TransportError::with_status(404, format!("File not found: {}", id)).into())
    }

    fn download(&self, url: &str) -> Result<String, SyncError> {
        let inner = self.inner.lock();
        let files = url
            .strip_prefix(EXPORT_URL_PREFIX)
            .and_then(|id| inner.projects.get(id))
            .ok_or_else(|| TransportError::with_status(404, format!("Not Found: {}", url)))?;

        if inner.corrupt_exports {
            return Ok("{\"files\": [".to_string());
        }

        let body = WireProject {
            files: files.clone(),
        };
        serde_json::to_string(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("failed to render export: {}", e)))
    }
}
