use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::drive::DriveEndpoints;

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for drive-script-sync
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Base URL of the Drive metadata API
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,
    /// Base URL of the Drive upload API
    #[serde(default = "defaults::upload_base_url")]
    pub upload_base_url: String,
    /// File holding the OAuth access token
    #[serde(default = "defaults::token_file")]
    pub token_file: PathBuf,
    /// Export/upload format of script projects
    #[serde(default = "defaults::project_mime_type")]
    pub project_mime_type: String,
    /// MIME type of script project documents (leaf query for folder listings)
    #[serde(default = "defaults::script_mime_type")]
    pub script_mime_type: String,
    /// MIME type of folder records when building the folder tree
    #[serde(default = "defaults::folder_mime_type")]
    pub folder_mime_type: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::api_base_url(),
            upload_base_url: defaults::upload_base_url(),
            token_file: defaults::token_file(),
            project_mime_type: defaults::project_mime_type(),
            script_mime_type: defaults::script_mime_type(),
            folder_mime_type: defaults::folder_mime_type(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from the config file (if any) and environment variables
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match env::var("SCRIPT_SYNC_CONFIG") {
                Ok(path) => expand_tilde(&PathBuf::from(path)),
                Err(_) => Self::config_file_path()?,
            },
        };
        tracing::debug!("loading drive-script-sync config from {:?}", config_path);

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else if explicit_path.is_some() {
            anyhow::bail!("config file not found at {:?}", config_path);
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SCRIPT_SYNC_API_BASE") {
            self.api_base_url = url;
        }
        if let Some(url) = lookup("SCRIPT_SYNC_UPLOAD_BASE") {
            self.upload_base_url = url;
        }
        if let Some(path) = lookup("SCRIPT_SYNC_TOKEN_FILE") {
            self.token_file = expand_tilde(&PathBuf::from(path));
        }
        if let Some(mime) = lookup("SCRIPT_SYNC_PROJECT_MIME") {
            self.project_mime_type = mime;
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: SyncConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.token_file = expand_tilde(&config.token_file);

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/drive-script-sync/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    pub fn endpoints(&self) -> DriveEndpoints {
        DriveEndpoints {
            api_base_url: self.api_base_url.clone(),
            upload_base_url: self.upload_base_url.clone(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::drive::{FOLDER_MIME_TYPE, PROJECT_MIME_TYPE, SCRIPT_MIME_TYPE};

    pub(crate) fn api_base_url() -> String {
        "https://www.googleapis.com/drive/v2".to_string()
    }

    pub(crate) fn upload_base_url() -> String {
        "https://www.googleapis.com/upload/drive/v2".to_string()
    }

    pub(crate) fn token_file() -> PathBuf {
        super::expand_tilde(&PathBuf::from("~/.config/drive-script-sync/token"))
    }

    pub(crate) fn project_mime_type() -> String {
        PROJECT_MIME_TYPE.to_string()
    }

    pub(crate) fn script_mime_type() -> String {
        SCRIPT_MIME_TYPE.to_string()
    }

    pub(crate) fn folder_mime_type() -> String {
        FOLDER_MIME_TYPE.to_string()
    }
}
