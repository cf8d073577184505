use std::fmt;

use super::{FileMetadata, RemoteStore};
use crate::error::SyncError;

/// Listing filter in the store's query syntax:
/// `mimeType='<value>'`, optionally `and trashed=false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveQuery {
    mime_type: String,
    exclude_trashed: bool,
}

impl DriveQuery {
    pub fn mime_type(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            exclude_trashed: false,
        }
    }

    pub fn not_trashed(mut self) -> Self {
        self.exclude_trashed = true;
        self
    }
}

impl fmt::Display for DriveQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped = self.mime_type.replace('\\', "\\\\").replace('\'', "\\'");
        write!(f, "mimeType='{}'", escaped)?;
        if self.exclude_trashed {
            write!(f, " and trashed=false")?;
        }
        Ok(())
    }
}

/// Drains a paginated listing into one complete result
pub struct RemoteFileLister<'a> {
    store: &'a dyn RemoteStore,
}

impl<'a> RemoteFileLister<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self { store }
    }

    /// All records matching `query`, in page order.
    ///
    /// Keeps requesting pages until one comes back without a continuation
    /// token. A failing page fails the whole listing.
    pub fn list(&self, query: &str) -> Result<Vec<FileMetadata>, SyncError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.store.list_page(query, page_token.as_deref())?;
            pages += 1;
            records.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(
            "listed {} record(s) in {} page(s) for query {}",
            records.len(),
            pages,
            query
        );
        Ok(records)
    }
}
