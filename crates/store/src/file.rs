//! File-based session store: one pretty-printed JSON document per session.
//!
//! Storage location: `~/.parley/sessions/<id>.json` (configurable).
//!
//! Files are human-inspectable. Writes go to a temporary file that is renamed
//! into place, so a crash mid-save never leaves a half-written session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::session::{Session, SessionId, SessionStore};
use tracing::{debug, info, warn};

const EXTENSION: &str = "json";

/// A directory of session files.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a session id, or `None` if the id could escape the directory.
    fn path_for(&self, id: &SessionId) -> Option<PathBuf> {
        let valid = !id.as_str().is_empty()
            && id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{}.{EXTENSION}", id.as_str())))
    }

    async fn read_session(path: &Path) -> Result<Session, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let path = self
            .path_for(&session.id)
            .ok_or_else(|| StoreError::Storage(format!("Invalid session id '{}'", session.id)))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize session: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to move session file: {e}")))?;

        info!(id = %session.id, turns = session.turns.len(), "Session saved");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let session = Self::read_session(&path).await?;
        info!(id = %id, turns = session.turns.len(), "Session loaded");
        Ok(Some(session))
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read session directory: {e}"
                )));
            }
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(error = %e, "Skipping unreadable session file"),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        debug!(count = sessions.len(), "Listed sessions");
        Ok(sessions)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(id = %id, "Session deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Storage(format!("Failed to delete session: {e}"))),
        }
    }
}
