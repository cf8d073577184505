use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::{TrackedFile, WorkspaceState};
use crate::script::{strip_extension, FileType, ProjectFileMap, ScriptInfo, ScriptProject};

const STATE_DIR: &str = ".script-sync";
const STATE_FILE: &str = "state.yaml";

/// Local state of one file relative to the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
    Unchanged,
}

/// What a push will send
#[derive(Debug, Clone)]
pub struct PushPlan {
    pub project: ScriptProject,
    /// Bare names of files whose contents changed since the last sync
    pub modified: BTreeSet<String>,
    /// Tracked files no longer present locally
    pub deleted: Vec<String>,
}

impl PushPlan {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// A directory mirroring one script project
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        LocalWorkspace {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    /// Compute SHA-256 hash of content
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.state_dir())
            .with_context(|| format!("Failed to create {:?}", self.state_dir()))?;
        Ok(())
    }

    pub fn is_tracked(&self) -> bool {
        self.state_path().exists()
    }

    pub fn read_state(&self) -> Result<WorkspaceState> {
        let state_path = self.state_path();
        if state_path.exists() {
            let content = fs::read_to_string(&state_path)
                .with_context(|| format!("Failed to read {:?}", state_path))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", state_path))
        } else {
            Ok(WorkspaceState::default())
        }
    }

    /// Replace the state file atomically (temp file + rename)
    pub fn write_state(&self, state: &WorkspaceState) -> Result<()> {
        self.initialize()?;

        let yaml = serde_yaml::to_string(state).context("Failed to serialize workspace state")?;
        let mut temp = NamedTempFile::new_in(self.state_dir())
            .context("Failed to create temporary state file")?;
        temp.write_all(yaml.as_bytes())
            .context("Failed to write temporary state file")?;
        temp.persist(self.state_path())
            .context("Failed to replace workspace state")?;

        Ok(())
    }

    pub fn update_state<F>(&self, update_fn: F) -> Result<()>
    where
        F: FnOnce(&mut WorkspaceState) -> Result<()>,
    {
        let mut state = self.read_state()?;
        update_fn(&mut state)?;
        self.write_state(&state)
    }

    fn file_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || name.is_empty() {
            anyhow::bail!("Refusing to use file name outside the workspace: {:?}", name);
        }
        Ok(self.root.join(relative))
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.file_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {:?}", path))
    }

    pub fn remove_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        }
        Ok(())
    }

    /// Supported files under the workspace root, keyed by `/`-separated relative name
    pub fn scan(&self) -> Result<BTreeMap<String, String>> {
        let mut files = BTreeMap::new();
        self.collect_files(&self.root, "", &mut files)?;
        Ok(files)
    }

    fn collect_files(
        &self,
        dir: &Path,
        prefix: &str,
        files: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let entries = fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))?;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name == STATE_DIR {
                continue;
            }

            let name = format!("{}{}", prefix, file_name);
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect_files(&entry.path(), &format!("{}/", name), files)?;
            } else if file_type.is_file() && FileType::for_file_name(&name).is_some() {
                let contents = fs::read_to_string(entry.path())
                    .with_context(|| format!("Failed to read {:?}", entry.path()))?;
                files.insert(name, contents);
            }
        }
        Ok(())
    }

    /// Write a freshly read project into the workspace and record it as synced.
    ///
    /// Previously tracked files the project no longer has are removed.
    pub fn record_pull(&self, project: &ScriptProject) -> Result<()> {
        let previous = self.read_state()?;

        let mut state = WorkspaceState {
            file_id: project.file_id.clone(),
            synced_at: Some(chrono::Utc::now()),
            files: BTreeMap::new(),
        };

        for (name, info) in &project.files {
            let contents = info.contents().unwrap_or_default();
            self.write_file(name, contents)?;
            state.files.insert(
                name.clone(),
                TrackedFile {
                    document_id: info.document_id().map(str::to_string),
                    file_type: info.file_type().to_string(),
                    sha256: Self::compute_hash(contents.as_bytes()),
                },
            );
        }

        for name in previous.files.keys() {
            if !project.files.contains_key(name) {
                tracing::info!("removing {} (no longer in project)", name);
                self.remove_file(name)?;
            }
        }

        self.write_state(&state)?;
        tracing::info!(
            "pulled {} file(s) of project {} into {:?}",
            state.files.len(),
            state.file_id,
            self.root
        );
        Ok(())
    }

    /// Build the project to push from local files and the last synced state
    pub fn plan_push(&self) -> Result<PushPlan> {
        if !self.is_tracked() {
            anyhow::bail!(
                "{:?} is not a synced workspace (missing {}/{}); pull a project first",
                self.root,
                STATE_DIR,
                STATE_FILE
            );
        }
        let state = self.read_state()?;
        let local = self.scan()?;

        let mut files = ProjectFileMap::new();
        let mut modified = BTreeSet::new();

        for (name, contents) in local {
            let Some(file_type) = FileType::for_file_name(&name) else {
                continue;
            };
            let tracked = state.files.get(&name);
            let document_id = tracked.and_then(|t| t.document_id.clone());
            let hash = Self::compute_hash(contents.as_bytes());
            let changed = match tracked {
                Some(t) => t.document_id.is_none() || t.sha256 != hash,
                None => true,
            };

            let bare_name = strip_extension(&name).to_string();
            if changed {
                modified.insert(bare_name.clone());
            }
            files.insert(
                name,
                ScriptInfo::new(Some(bare_name), document_id, file_type.tag(), Some(contents)),
            );
        }

        let deleted = state
            .files
            .keys()
            .filter(|name| !files.contains_key(*name))
            .cloned()
            .collect();

        Ok(PushPlan {
            project: ScriptProject::new(state.file_id, files),
            modified,
            deleted,
        })
    }

    /// Record a successful push. `assigned` holds ids the server gave new files.
    pub fn record_push(
        &self,
        plan: &PushPlan,
        assigned: &BTreeMap<String, ScriptInfo>,
    ) -> Result<()> {
        self.update_state(|state| {
            state.files.clear();
            for (name, info) in &plan.project.files {
                let document_id = info
                    .document_id()
                    .or_else(|| assigned.get(name).and_then(ScriptInfo::document_id))
                    .map(str::to_string);
                state.files.insert(
                    name.clone(),
                    TrackedFile {
                        document_id,
                        file_type: info.file_type().to_string(),
                        sha256: Self::compute_hash(info.contents().unwrap_or_default().as_bytes()),
                    },
                );
            }
            state.synced_at = Some(chrono::Utc::now());
            Ok(())
        })
    }

    /// Per-file status against the last sync, without touching the network
    pub fn status(&self) -> Result<Vec<(String, FileStatus)>> {
        let state = self.read_state()?;
        let local = self.scan()?;

        let mut statuses: BTreeMap<String, FileStatus> = BTreeMap::new();
        for (name, contents) in &local {
            let status = match state.files.get(name) {
                Some(t) if t.document_id.is_none() => FileStatus::New,
                Some(t) if t.sha256 == Self::compute_hash(contents.as_bytes()) => {
                    FileStatus::Unchanged
                }
                Some(_) => FileStatus::Modified,
                None => FileStatus::New,
            };
            statuses.insert(name.clone(), status);
        }
        for name in state.files.keys() {
            if !local.contains_key(name) {
                statuses.insert(name.clone(), FileStatus::Deleted);
            }
        }

        Ok(statuses.into_iter().collect())
    }
}
