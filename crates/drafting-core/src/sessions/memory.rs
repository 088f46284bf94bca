//! In-process session repository

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SessionRepository;
use crate::document::DraftSession;
use crate::error::{DraftingError, Result};

/// Sessions held in a map; lost on restart
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, DraftSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, session: &DraftSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(DraftingError::Validation(format!(
                "session {} already exists",
                session.session_id
            )));
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<DraftSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        session: &DraftSession,
        expected_version: i64,
    ) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.session_id) {
            Some(stored) if stored.version == expected_version => {
                *stored = session.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list_by_template(&self, template_id: &str) -> Result<Vec<DraftSession>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<DraftSession> = sessions
            .values()
            .filter(|s| s.template_id == template_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
