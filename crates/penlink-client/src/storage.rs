//! Persisted session token.
//!
//! The only local storage this client keeps is the bearer token, written as
//! `{"token": "..."}` to `session.json` in the data directory:
//! - Linux:   `~/.local/share/penlink/session.json`
//! - macOS:   `~/Library/Application Support/com.penlink.penlink/session.json`
//! - Windows: `{FOLDERID_RoamingAppData}\penlink\penlink\data\session.json`

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

const SESSION_FILE: &str = "session.json";

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store in the platform data directory.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "penlink", "penlink").ok_or(ClientError::NoDataDir)?;
        Ok(Self::open_at(dirs.data_dir()))
    }

    /// Store inside an explicit directory.
    pub fn open_at(dir: &Path) -> Self {
        Self {
            path: dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved token; a missing file means no session.
    pub fn load(&self) -> Result<Option<String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSession = serde_json::from_str(&raw)?;
        Ok(Some(stored.token).filter(|t| !t.is_empty()))
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string(&StoredSession {
            token: token.to_string(),
        })?;
        std::fs::write(&self.path, body)?;
        tracing::debug!(path = %self.path.display(), "Session token saved");
        Ok(())
    }

    /// Forget the token (logout). Clearing twice is fine.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
