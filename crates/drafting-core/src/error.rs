//! Error types for the template and session stores
//!
//! Every failure is explicit and typed. Only the HTTP boundary decides how to
//! render an error to the end user.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::document::SessionStatus;

pub type Result<T> = std::result::Result<T, DraftingError>;

/// Which aggregate a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Template,
    Session,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Template => write!(f, "template"),
            RecordKind::Session => write!(f, "session"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DraftingError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("Session {session_id} cannot move from {from} to {to}")]
    InvalidTransition {
        session_id: String,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Session {session_id} was modified concurrently ({attempts} attempts)")]
    Conflict { session_id: String, attempts: u32 },

    #[error("No template found for: {0}")]
    NoTemplateFound(String),

    #[error("Record {id} is corrupted: {reason}")]
    Corrupted { id: String, reason: String },

    #[error("Session storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl DraftingError {
    pub fn template_not_found(id: impl Into<String>) -> Self {
        DraftingError::NotFound {
            kind: RecordKind::Template,
            id: id.into(),
        }
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        DraftingError::NotFound {
            kind: RecordKind::Session,
            id: id.into(),
        }
    }

    pub fn upstream(service: &'static str, reason: impl fmt::Display) -> Self {
        DraftingError::UpstreamUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn corrupted(id: impl Into<String>, reason: impl fmt::Display) -> Self {
        DraftingError::Corrupted {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Only upstream failures may be retried, and only by the resolver.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DraftingError::UpstreamUnavailable { .. })
    }
}

/// Bound an upstream call by `limit`; an elapsed timer becomes `UpstreamUnavailable`.
pub async fn with_timeout<T, F>(service: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} call timed out after {:?}", service, limit);
            Err(DraftingError::upstream(
                service,
                format!("timed out after {:?}", limit),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_upstream() {
        let result: Result<()> = with_timeout("embedding", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        match result {
            Err(DraftingError::UpstreamUnavailable { service, reason }) => {
                assert_eq!(service, "embedding");
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_passes_through_result() {
        let result = with_timeout("index", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(DraftingError::upstream("bootstrap", "503").is_retryable());
        assert!(!DraftingError::template_not_found("t1").is_retryable());
        assert!(!DraftingError::Conflict {
            session_id: "s1".to_string(),
            attempts: 8
        }
        .is_retryable());
    }

    #[test]
    fn test_not_found_message_names_kind() {
        let err = DraftingError::session_not_found("abc");
        assert_eq!(err.to_string(), "session not found: abc");
    }
}
