//! Draft session storage
//!
//! `SessionRepository` is the store of record: plain CRUD plus a
//! compare-and-set primitive on the session `version`. `SessionStore` builds
//! the read-modify-write operations (merge, status transitions) on top of it
//! so that concurrent partial submissions never lose each other's keys.

pub mod memory;
pub mod sqlite;

pub use memory::InMemorySessionRepository;
pub use sqlite::SqliteSessionRepository;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::document::{DraftSession, FilledValues, SessionStatus, Template};
use crate::error::{DraftingError, Result};
use crate::templates::TemplateStore;

pub const DEFAULT_MERGE_RETRIES: u32 = 8;

/// Persistence for draft sessions
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session; fails if the id already exists
    async fn insert(&self, session: &DraftSession) -> Result<()>;

    async fn get(&self, session_id: &str) -> Result<Option<DraftSession>>;

    /// Replace the stored session only if its version is still
    /// `expected_version`. Returns false when another writer got there first
    /// or the session no longer exists.
    async fn compare_and_swap(&self, session: &DraftSession, expected_version: i64)
        -> Result<bool>;

    /// Returns whether a session was removed
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Sessions for one template, newest first
    async fn list_by_template(&self, template_id: &str) -> Result<Vec<DraftSession>>;

    /// Cheap liveness check for health endpoints
    async fn ping(&self) -> Result<()>;
}

/// Session operations with atomic merge and monotonic status
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    templates: Arc<TemplateStore>,
    merge_retries: u32,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>, templates: Arc<TemplateStore>) -> Self {
        Self::with_merge_retries(repo, templates, DEFAULT_MERGE_RETRIES)
    }

    pub fn with_merge_retries(
        repo: Arc<dyn SessionRepository>,
        templates: Arc<TemplateStore>,
        merge_retries: u32,
    ) -> Self {
        Self {
            repo,
            templates,
            merge_retries: merge_retries.max(1),
        }
    }

    /// Start an empty session for an existing template
    pub async fn create(&self, template_id: &str) -> Result<DraftSession> {
        self.create_with_values(template_id, FilledValues::new())
            .await
    }

    /// Start a session with answers already known
    pub async fn create_with_values(
        &self,
        template_id: &str,
        initial: FilledValues,
    ) -> Result<DraftSession> {
        // The template must exist; sessions never point at nothing
        let template = self.templates.get_by_id(template_id).await?;
        self.create_for(&template, initial).await
    }

    /// Start a session on a template the caller has already fetched
    pub async fn create_for(
        &self,
        template: &Template,
        initial: FilledValues,
    ) -> Result<DraftSession> {
        validate_values(&initial)?;

        let session = DraftSession::new(
            Uuid::new_v4().to_string(),
            template.id.clone(),
            initial,
        );
        self.repo.insert(&session).await?;

        tracing::info!(
            "Created session {} for template {}",
            session.session_id,
            template.id
        );
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<DraftSession> {
        self.repo
            .get(session_id)
            .await?
            .ok_or_else(|| DraftingError::session_not_found(session_id))
    }

    /// Merge answers into a session; last write wins per key
    pub async fn merge(&self, session_id: &str, values: FilledValues) -> Result<DraftSession> {
        validate_values(&values)?;

        self.update(session_id, |current| {
            if current.is_completed() {
                return Err(DraftingError::InvalidTransition {
                    session_id: current.session_id.clone(),
                    from: current.status,
                    to: SessionStatus::InProgress,
                });
            }

            let unchanged = values
                .iter()
                .all(|(key, value)| current.filled_values.get(key) == Some(value));
            if unchanged {
                return Ok(None);
            }

            let mut next = current.clone();
            next.filled_values
                .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Some(next))
        })
        .await
    }

    /// Move a session to `status`
    ///
    /// Completion happens once; a completed session never changes status.
    pub async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<DraftSession> {
        self.update(session_id, |current| {
            transition(current, status)?;
            if status == SessionStatus::InProgress {
                return Ok(None);
            }

            let mut next = current.clone();
            next.status = SessionStatus::Completed;
            next.completed_at = Some(Utc::now());
            Ok(Some(next))
        })
        .await
    }

    /// Complete a session and record its rendered draft in one write
    ///
    /// `final_draft` must have been rendered from the session at
    /// `expected_version`. Returns `None` without writing when the session
    /// has changed since, so the caller can render again from fresh state.
    pub async fn complete(
        &self,
        session_id: &str,
        expected_version: i64,
        final_draft: String,
    ) -> Result<Option<DraftSession>> {
        let current = self.get(session_id).await?;
        if current.version != expected_version {
            return Ok(None);
        }
        transition(&current, SessionStatus::Completed)?;

        let now = Utc::now();
        let mut next = current;
        next.status = SessionStatus::Completed;
        next.completed_at = Some(now);
        next.final_draft = Some(final_draft);
        next.version = expected_version + 1;
        next.updated_at = now;

        if !self.repo.compare_and_swap(&next, expected_version).await? {
            return Ok(None);
        }

        tracing::info!("Completed session {}", session_id);
        Ok(Some(next))
    }

    /// Idempotent; returns whether anything was removed
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self.repo.delete(session_id).await?;
        if removed {
            tracing::info!("Deleted session {}", session_id);
        }
        Ok(removed)
    }

    pub async fn list_by_template(&self, template_id: &str) -> Result<Vec<DraftSession>> {
        self.repo.list_by_template(template_id).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }

    /// Write attempts allowed before a contended operation gives up
    pub fn merge_retries(&self) -> u32 {
        self.merge_retries
    }

    /// Optimistic read-modify-write loop
    ///
    /// `change` returns `None` when the current state already satisfies the
    /// request, in which case nothing is written.
    async fn update<F>(&self, session_id: &str, change: F) -> Result<DraftSession>
    where
        F: Fn(&DraftSession) -> Result<Option<DraftSession>>,
    {
        for attempt in 1..=self.merge_retries {
            let current = self.get(session_id).await?;

            let mut next = match change(&current)? {
                Some(next) => next,
                None => return Ok(current),
            };
            next.version = current.version + 1;
            next.updated_at = Utc::now();

            if self.repo.compare_and_swap(&next, current.version).await? {
                return Ok(next);
            }

            tracing::warn!(
                "Session {} changed concurrently (attempt {}/{})",
                session_id,
                attempt,
                self.merge_retries
            );
            tokio::task::yield_now().await;
        }

        Err(DraftingError::Conflict {
            session_id: session_id.to_string(),
            attempts: self.merge_retries,
        })
    }
}

fn transition(current: &DraftSession, to: SessionStatus) -> Result<()> {
    if current.is_completed() {
        return Err(DraftingError::InvalidTransition {
            session_id: current.session_id.clone(),
            from: current.status,
            to,
        });
    }
    Ok(())
}

/// Answers are scalars keyed by non-empty names
fn validate_values(values: &FilledValues) -> Result<()> {
    for (key, value) in values {
        if key.trim().is_empty() {
            return Err(DraftingError::Validation(
                "answer keys must not be empty".to_string(),
            ));
        }
        if value.is_array() || value.is_object() {
            return Err(DraftingError::Validation(format!(
                "answer for '{}' must be a string, number or boolean",
                key
            )));
        }
    }
    Ok(())
}
