use std::collections::{BTreeSet, HashMap, HashSet};

use super::{DriveQuery, FileMetadata, RemoteFileLister, RemoteStore, FOLDER_MIME_TYPE};
use crate::error::SyncError;

static NO_CHILDREN: BTreeSet<String> = BTreeSet::new();

/// Snapshot of a filtered folder hierarchy, indexed by record id.
///
/// Built once from two listings (the leaf query and all non-trashed folders)
/// and never refreshed; build a new cache to see new remote state.
///
/// Adjacency comes only from parent references on cached records. A record
/// whose parent folder was not fetched stays disconnected from the tree.
#[derive(Debug, Clone)]
pub struct FolderCache {
    root_id: String,
    ids_to_metadata: HashMap<String, FileMetadata>,
    leaf_ids: HashSet<String>,
    parent_to_children: HashMap<String, BTreeSet<String>>,
}

impl FolderCache {
    /// Fetch the hierarchy using the standard folder MIME type
    pub fn build(store: &dyn RemoteStore, leaf_query: &str) -> Result<Self, SyncError> {
        Self::build_with_folder_type(store, leaf_query, FOLDER_MIME_TYPE)
    }

    /// Fetch the hierarchy, treating records of `folder_mime_type` as folders.
    /// Any listing failure aborts the build.
    pub fn build_with_folder_type(
        store: &dyn RemoteStore,
        leaf_query: &str,
        folder_mime_type: &str,
    ) -> Result<Self, SyncError> {
        let root_id = store.root_id()?;
        let lister = RemoteFileLister::new(store);

        let mut ids_to_metadata = HashMap::new();
        let mut leaf_ids = HashSet::new();

        for meta in lister.list(leaf_query)? {
            leaf_ids.insert(meta.id.clone());
            ids_to_metadata.insert(meta.id.clone(), meta);
        }

        let folder_query = DriveQuery::mime_type(folder_mime_type)
            .not_trashed()
            .to_string();
        for meta in lister.list(&folder_query)? {
            ids_to_metadata.insert(meta.id.clone(), meta);
        }

        let mut parent_to_children: HashMap<String, BTreeSet<String>> = HashMap::new();
        for meta in ids_to_metadata.values() {
            for parent_id in meta.parent_ids() {
                parent_to_children
                    .entry(parent_id.to_string())
                    .or_default()
                    .insert(meta.id.clone());
            }
        }

        tracing::info!(
            "cached {} record(s), {} leaf(s) under root {}",
            ids_to_metadata.len(),
            leaf_ids.len(),
            root_id
        );

        Ok(Self {
            root_id,
            ids_to_metadata,
            leaf_ids,
            parent_to_children,
        })
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Ids whose records name `id` as a parent; empty for unknown ids
    pub fn children_of(&self, id: &str) -> &BTreeSet<String> {
        self.parent_to_children.get(id).unwrap_or(&NO_CHILDREN)
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        self.leaf_ids.contains(id)
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.ids_to_metadata.get(id).map(|m| m.title.as_str())
    }

    pub fn metadata(&self, id: &str) -> Option<&FileMetadata> {
        self.ids_to_metadata.get(id)
    }

    pub fn len(&self) -> usize {
        self.ids_to_metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_to_metadata.is_empty()
    }
}
