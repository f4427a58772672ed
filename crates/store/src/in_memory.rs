//! In-memory session store. Nothing survives the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::session::{Session, SessionId, SessionStore};
use tokio::sync::RwLock;

/// Keeps sessions in a map keyed by id.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::turn::Turn;

    #[tokio::test]
    async fn save_load_delete() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("anthropic");
        session.push(Turn::user("Hello"));
        store.save(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 1);

        assert!(store.delete(&session.id).await.unwrap());
        assert!(!store.delete(&session.id).await.unwrap());
        assert!(store.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("anthropic");
        store.save(&session).await.unwrap();
        session.push(Turn::user("again"));
        store.save(&session).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.load(&session.id).await.unwrap().unwrap().turns.len(), 1);
    }

    #[tokio::test]
    async fn find_by_name_uses_list() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("ollama");
        session.name = Some("refactor".into());
        store.save(&session).await.unwrap();
        store.save(&Session::new("ollama")).await.unwrap();

        let found = store.find_by_name("refactor").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert!(store.find_by_name("other").await.unwrap().is_none());
    }
}
