use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

use crate::error::SyncError;

/// Environment variable holding an OAuth access token
pub const ACCESS_TOKEN_ENV: &str = "SCRIPT_SYNC_ACCESS_TOKEN";

/// An OAuth bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Source of credentials for a sync session
pub trait CredentialProvider: Send + Sync {
    fn is_logged_in(&self) -> bool;

    /// Obtain a credential. With `prompt` the provider may ask the user.
    fn log_in(&self, prompt: bool) -> Result<(), SyncError>;

    fn credential(&self) -> Result<Credential, SyncError>;

    /// Forget any stored credential
    fn log_out(&self) -> Result<(), SyncError>;
}

/// Access-token credentials from the environment or a token file
pub struct TokenCredentials {
    token_file: PathBuf,
    current: Mutex<Option<Credential>>,
}

impl TokenCredentials {
    /// Pick up a token from `SCRIPT_SYNC_ACCESS_TOKEN` or `token_file`, if present
    pub fn new(token_file: impl Into<PathBuf>) -> Self {
        let token_file = token_file.into();
        let current = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Credential::new(t.trim()))
            .or_else(|| read_token_file(&token_file));
        Self {
            token_file,
            current: Mutex::new(current),
        }
    }

    /// Provider holding a fixed token; nothing is read from disk
    pub fn with_token(token_file: impl Into<PathBuf>, token: impl Into<String>) -> Self {
        Self {
            token_file: token_file.into(),
            current: Mutex::new(Some(Credential::new(token))),
        }
    }

    fn store(&self, token: &str) -> Result<(), SyncError> {
        if let Some(parent) = self.token_file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Auth(format!("failed to create {:?}: {}", parent, e))
            })?;
        }
        fs::write(&self.token_file, token).map_err(|e| {
            SyncError::Auth(format!("failed to save token to {:?}: {}", self.token_file, e))
        })
    }
}

fn read_token_file(path: &Path) -> Option<Credential> {
    let token = fs::read_to_string(path).ok()?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        tracing::debug!("loaded access token from {:?}", path);
        Some(Credential::new(token))
    }
}

impl CredentialProvider for TokenCredentials {
    fn is_logged_in(&self) -> bool {
        self.current.lock().is_some()
    }

    fn log_in(&self, prompt: bool) -> Result<(), SyncError> {
        if let Some(credential) = read_token_file(&self.token_file) {
            *self.current.lock() = Some(credential);
            return Ok(());
        }
        if !prompt {
            return Err(SyncError::Auth(format!(
                "no access token; set {} or run with a terminal to log in",
                ACCESS_TOKEN_ENV
            )));
        }

        let token = dialoguer::Password::new()
            .with_prompt("Drive access token")
            .interact()
            .map_err(|e| SyncError::Auth(format!("login prompt failed: {}", e)))?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(SyncError::Auth("empty access token".to_string()));
        }

        self.store(&token)?;
        *self.current.lock() = Some(Credential::new(token));
        tracing::info!("stored access token in {:?}", self.token_file);
        Ok(())
    }

    fn credential(&self) -> Result<Credential, SyncError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Auth("not logged in".to_string()))
    }

    fn log_out(&self) -> Result<(), SyncError> {
        *self.current.lock() = None;
        if self.token_file.exists() {
            fs::remove_file(&self.token_file).map_err(|e| {
                SyncError::Auth(format!("failed to remove {:?}: {}", self.token_file, e))
            })?;
        }
        Ok(())
    }
}
