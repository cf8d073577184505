use super::FileMetadata;
use crate::error::SyncError;

/// One page of a listing call
#[derive(Debug, Clone, Default)]
pub struct FilePage {
    pub items: Vec<FileMetadata>,
    /// Continuation token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Blocking access to a remote document store.
///
/// Implementations report call failures as `SyncError::Transport` and
/// undecodable responses as `SyncError::MalformedResponse`.
pub trait RemoteStore: Send + Sync {
    /// Id of the root folder of the store
    fn root_id(&self) -> Result<String, SyncError>;

    /// Fetch the metadata record of a single file
    fn get_metadata(&self, id: &str) -> Result<FileMetadata, SyncError>;

    /// Fetch one page of records matching `query`
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<FilePage, SyncError>;

    /// Replace the whole content of document `id` with `body`.
    /// Returns the document's metadata after the update.
    fn update_content(
        &self,
        id: &str,
        mime_type: &str,
        body: &str,
    ) -> Result<FileMetadata, SyncError>;

    /// GET `url` (typically an export link) and return the body text
    fn download(&self, url: &str) -> Result<String, SyncError>;
}
