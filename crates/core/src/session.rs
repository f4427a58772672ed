//! Session domain type and the persistence trait.
//!
//! A session is the unit of persistence: the complete, unoptimized turn history
//! plus naming metadata. Stores save and load whole sessions, never
//! individual turns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::turn::Turn;

/// Length of the random suffix in generated session ids.
const ID_SUFFIX_LEN: usize = 6;

/// Unique identifier for a session: UTC timestamp plus a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new id such as `20250114-093012-k3v9qa`.
    pub fn generate() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("{}-{suffix}", Utc::now().format("%Y%m%d-%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved (or saveable) conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Optional user-chosen name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Complete turn history in conversation order
    pub turns: Vec<Turn>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Provider the session was held with
    pub provider_id: String,
}

impl Session {
    /// Create a new empty session.
    pub fn new(provider_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            name: None,
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
            provider_id: provider_id.into(),
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Remove and return the last turn.
    pub fn pop(&mut self) -> Option<Turn> {
        let turn = self.turns.pop();
        if turn.is_some() {
            self.updated_at = Utc::now();
        }
        turn
    }

    /// Display label: the name if set, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Session persistence collaborator.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A short name for this store (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Save a session, replacing any previous copy with the same id.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Load a session by id.
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// All sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<Session>, StoreError>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;

    /// The most recently updated session with this name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|s| s.name.as_deref() == Some(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_timestamp_and_suffix() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn push_and_pop_track_updates() {
        let mut session = Session::new("anthropic");
        let created = session.created_at;
        session.push(Turn::user("First"));
        assert_eq!(session.turns.len(), 1);
        assert!(session.updated_at >= created);
        assert_eq!(session.pop().unwrap().content, "First");
        assert!(session.pop().is_none());
    }

    #[test]
    fn label_prefers_name() {
        let mut session = Session::new("ollama");
        assert_eq!(session.label(), session.id.as_str());
        session.name = Some("refactor".into());
        assert_eq!(session.label(), "refactor");
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = SessionId::from("20250101-000000-abcdef");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""20250101-000000-abcdef""#);
    }
}
