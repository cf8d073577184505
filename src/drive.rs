mod client;
mod folder_cache;
mod lister;
mod memory;
mod metadata;
mod traits;

pub use client::{DriveClient, DriveEndpoints};
pub use folder_cache::FolderCache;
pub use lister::{DriveQuery, RemoteFileLister};
pub use memory::MemoryStore;
pub use metadata::{FileMetadata, Labels, ParentReference};
pub use traits::{FilePage, RemoteStore};

/// MIME type of script project documents
pub const SCRIPT_MIME_TYPE: &str = "application/vnd.google-apps.script";
/// Export/upload format carrying a script project as JSON
pub const PROJECT_MIME_TYPE: &str = "application/vnd.google-apps.script+json";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
