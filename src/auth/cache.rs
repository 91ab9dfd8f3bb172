//! Best-effort durable token cache.
//!
//! A single JSON record keyed by app ID. The cache is never a source of
//! truth: read and write failures degrade to "no cached tokens", which
//! forces a fresh authorization on the next run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Durable token record. Honored on load only when `app_id` matches the
/// active application identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub app_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// File-backed token cache for one application identity.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
    app_id: String,
}

impl TokenCache {
    pub fn new(base_dir: PathBuf, app_id: impl Into<String>) -> Self {
        Self {
            path: base_dir.join("tokens.json"),
            app_id: app_id.into(),
        }
    }

    /// Cache rooted at `~/.feishu-mcp`.
    pub fn new_default(app_id: impl Into<String>) -> Self {
        Self::new(default_cache_dir(), app_id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached record. Missing file, unreadable JSON, and a
    /// mismatched `app_id` all behave as "no record".
    pub fn load(&self) -> Option<TokenRecord> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let record: TokenRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!("Ignoring unreadable token cache: {err}");
                return None;
            }
        };
        if record.app_id != self.app_id {
            tracing::debug!("Ignoring cached tokens for a different app identity");
            return None;
        }
        Some(record)
    }

    /// Overwrite the record. IO failures are logged and swallowed.
    pub fn save(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        let record = TokenRecord {
            app_id: self.app_id.clone(),
            access_token: access_token.map(String::from),
            refresh_token: refresh_token.map(String::from),
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::debug!("Failed to create token cache directory: {err}");
                return;
            }
        }
        let serialized = match serde_json::to_string_pretty(&record) {
            Ok(s) => s,
            Err(err) => {
                tracing::debug!("Failed to serialize token cache: {err}");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, serialized) {
            tracing::debug!("Failed to write token cache: {err}");
            return;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }
    }

    /// Remove the record file if present; idempotent.
    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::debug!("Failed to remove token cache: {err}"),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".feishu-mcp"))
        .unwrap_or_else(|| PathBuf::from(".feishu-mcp"))
}
