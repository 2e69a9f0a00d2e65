use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::io::cache::atomic_write;
use crate::io::lock::{LockError, with_lock};

/// Error type for session persistence
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not write session: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode session: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// A signed-in account, persisted between invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend the token was issued by
    pub api_url: String,
    pub email: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(api_url: &str, email: &str, token: &str) -> Self {
        Session {
            api_url: api_url.to_string(),
            email: email.to_string(),
            token: token.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Key used to separate caches of different accounts and servers
    pub fn account_key(&self) -> String {
        let raw = format!("{}@{}", self.email, self.api_url);
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

/// Read the session file. Missing or unreadable sessions count as logged out.
pub fn read_session(path: &Path) -> Option<Session> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
            None
        }
    }
}

/// Write the session file (owner-only permissions on Unix)
pub fn write_session(path: &Path, session: &Session) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(session)?;
    with_lock(path, || -> Result<(), SessionError> {
        atomic_write(path, content.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    })
}

/// Remove the session file. Already-absent is fine.
pub fn clear_session(path: &Path) -> Result<(), SessionError> {
    if !path.exists() {
        return Ok(());
    }
    with_lock(path, || match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::Io(e)),
    })
}
