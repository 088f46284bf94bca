//! Question/answer drafting workflow
//!
//! A session is AWAITING_ANSWERS while required variables are missing,
//! READY_TO_RENDER once none are, and COMPLETED after the draft has been
//! rendered and recorded. State is always derived from what is persisted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::document::{DraftSession, FilledValues, SessionStatus, Template, VariableDefinition};
use crate::error::{DraftingError, Result};
use crate::render::{missing_variables, render_body};
use crate::sessions::SessionStore;
use crate::templates::TemplateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftState {
    AwaitingAnswers,
    ReadyToRender,
    Completed,
}

/// A session together with what it still needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session: DraftSession,
    pub state: DraftState,
    pub missing: Vec<VariableDefinition>,
}

impl SessionView {
    fn derive(session: DraftSession, template: &Template) -> Self {
        let missing: Vec<VariableDefinition> = if session.is_completed() {
            vec![]
        } else {
            missing_variables(template, &session.filled_values)
                .into_iter()
                .cloned()
                .collect()
        };

        let state = if session.is_completed() {
            DraftState::Completed
        } else if missing.is_empty() {
            DraftState::ReadyToRender
        } else {
            DraftState::AwaitingAnswers
        };

        Self {
            session,
            state,
            missing,
        }
    }
}

/// Outcome of an answer submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    NeedsAnswers {
        session: DraftSession,
        missing: Vec<VariableDefinition>,
    },
    Completed {
        session: DraftSession,
        rendered: String,
    },
}

pub struct DraftWorkflow {
    templates: Arc<TemplateStore>,
    sessions: Arc<SessionStore>,
}

impl DraftWorkflow {
    pub fn new(templates: Arc<TemplateStore>, sessions: Arc<SessionStore>) -> Self {
        Self {
            templates,
            sessions,
        }
    }

    /// Open a session on `template_id`, optionally with known answers
    pub async fn start(&self, template_id: &str, prefilled: FilledValues) -> Result<SessionView> {
        let template = self.templates.get_by_id(template_id).await?;
        let session = self.sessions.create_for(&template, prefilled).await?;
        Ok(SessionView::derive(session, &template))
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView> {
        let session = self.sessions.get(session_id).await?;
        let template = self.templates.get_by_id(&session.template_id).await?;
        Ok(SessionView::derive(session, &template))
    }

    /// Required variables still unanswered, in template order
    pub async fn missing(&self, session_id: &str) -> Result<Vec<VariableDefinition>> {
        Ok(self.view(session_id).await?.missing)
    }

    pub async fn state(&self, session_id: &str) -> Result<DraftState> {
        Ok(self.view(session_id).await?.state)
    }

    /// Merge answers, then either ask for what is missing or render and complete
    ///
    /// The draft is rendered from one persisted version and recorded only if
    /// that version is still current. Otherwise the session is re-read and
    /// the decision made again, up to the store's retry budget.
    pub async fn submit_answers(
        &self,
        session_id: &str,
        answers: FilledValues,
    ) -> Result<Submission> {
        let mut session = self.sessions.merge(session_id, answers.clone()).await?;
        let template = self.templates.get_by_id(&session.template_id).await?;
        let attempts = self.sessions.merge_retries();

        for attempt in 1..=attempts {
            if session.is_completed() {
                return completed_elsewhere(session, &answers);
            }

            let missing: Vec<VariableDefinition> =
                missing_variables(&template, &session.filled_values)
                    .into_iter()
                    .cloned()
                    .collect();
            if !missing.is_empty() {
                tracing::debug!(
                    "Session {} still needs {} answers",
                    session_id,
                    missing.len()
                );
                return Ok(Submission::NeedsAnswers { session, missing });
            }

            let rendered = render_body(&template.body, &session.filled_values);
            if let Some(done) = self
                .sessions
                .complete(session_id, session.version, rendered.clone())
                .await?
            {
                return Ok(Submission::Completed {
                    session: done,
                    rendered,
                });
            }

            tracing::warn!(
                "Session {} changed before completion (attempt {}/{})",
                session_id,
                attempt,
                attempts
            );
            session = self.sessions.get(session_id).await?;
        }

        Err(DraftingError::Conflict {
            session_id: session_id.to_string(),
            attempts,
        })
    }
}

/// Another submission completed the session after our merge landed
///
/// If the recorded draft was rendered with these answers the submission
/// succeeded; otherwise the session can no longer take them.
fn completed_elsewhere(session: DraftSession, answers: &FilledValues) -> Result<Submission> {
    let included = answers
        .iter()
        .all(|(key, value)| session.filled_values.get(key) == Some(value));

    match session.final_draft.clone() {
        Some(rendered) if included => Ok(Submission::Completed { session, rendered }),
        _ => Err(DraftingError::InvalidTransition {
            session_id: session.session_id.clone(),
            from: session.status,
            to: SessionStatus::InProgress,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NewTemplate, VariableType};
    use crate::embeddings::EmbeddingProvider;
    use crate::index::InMemoryTemplateIndex;
    use crate::sessions::{InMemorySessionRepository, SessionRepository};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.3, 0.4])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    async fn workflow() -> (DraftWorkflow, String) {
        let templates = Arc::new(TemplateStore::new(
            Arc::new(InMemoryTemplateIndex::new()),
            Arc::new(ConstantEmbedder),
        ));
        let sessions = Arc::new(SessionStore::new(
            Arc::new(InMemorySessionRepository::new()),
            templates.clone(),
        ));
        let template = templates
            .create(NewTemplate {
                title: "Lease".to_string(),
                doc_type: "Lease".to_string(),
                jurisdiction: "US".to_string(),
                description: String::new(),
                body: "{{v1}} {{v2}} {{v3}} {{note}}".to_string(),
                variables: vec![
                    VariableDefinition::new("v1", VariableType::Text),
                    VariableDefinition::new("v2", VariableType::Number),
                    VariableDefinition::new("v3", VariableType::Date),
                    VariableDefinition::new("note", VariableType::Text).optional(),
                ],
                tags: vec![],
                embedding_seed_text: None,
            })
            .await
            .unwrap();
        (DraftWorkflow::new(templates, sessions), template.id)
    }

    fn answers(pairs: &[(&str, serde_json::Value)]) -> FilledValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_in_template_order() {
        let (workflow, template_id) = workflow().await;
        let view = workflow
            .start(&template_id, answers(&[("v2", json!(5))]))
            .await
            .unwrap();

        let keys: Vec<&str> = view.missing.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["v1", "v3"]);
        assert_eq!(view.state, DraftState::AwaitingAnswers);
    }

    #[tokio::test]
    async fn test_fully_prefilled_start_is_ready() {
        let (workflow, template_id) = workflow().await;
        let view = workflow
            .start(
                &template_id,
                answers(&[("v1", json!("a")), ("v2", json!(1)), ("v3", json!("2024-01-01"))]),
            )
            .await
            .unwrap();
        assert_eq!(view.state, DraftState::ReadyToRender);
        assert_eq!(
            workflow.state(&view.session.session_id).await.unwrap(),
            DraftState::ReadyToRender
        );
    }

    #[tokio::test]
    async fn test_submit_until_complete() {
        let (workflow, template_id) = workflow().await;
        let view = workflow.start(&template_id, FilledValues::new()).await.unwrap();
        let id = view.session.session_id;

        match workflow
            .submit_answers(&id, answers(&[("v1", json!("a"))]))
            .await
            .unwrap()
        {
            Submission::NeedsAnswers { missing, .. } => assert_eq!(missing.len(), 2),
            other => panic!("expected more questions, got {:?}", other),
        }

        match workflow
            .submit_answers(&id, answers(&[("v2", json!(1.5)), ("v3", json!(true))]))
            .await
            .unwrap()
        {
            Submission::Completed { session, rendered } => {
                assert_eq!(rendered, "a 1.5 true {{note}}");
                assert_eq!(session.final_draft.as_deref(), Some(rendered.as_str()));
            }
            other => panic!("expected completion, got {:?}", other),
        }

        assert_eq!(workflow.state(&id).await.unwrap(), DraftState::Completed);
        assert!(workflow.missing(&id).await.unwrap().is_empty());
        assert!(matches!(
            workflow.submit_answers(&id, answers(&[("note", json!("x"))])).await,
            Err(DraftingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_unknown_template() {
        let (workflow, _) = workflow().await;
        assert!(matches!(
            workflow.start("nope", FilledValues::new()).await,
            Err(DraftingError::NotFound { .. })
        ));
    }

    /// Commits another writer's answer just before the first completing write
    struct RacingRepository {
        inner: InMemorySessionRepository,
        raced: AtomicBool,
    }

    #[async_trait]
    impl SessionRepository for RacingRepository {
        async fn insert(&self, session: &DraftSession) -> Result<()> {
            self.inner.insert(session).await
        }

        async fn get(&self, session_id: &str) -> Result<Option<DraftSession>> {
            self.inner.get(session_id).await
        }

        async fn compare_and_swap(
            &self,
            session: &DraftSession,
            expected_version: i64,
        ) -> Result<bool> {
            if session.is_completed() && !self.raced.swap(true, Ordering::SeqCst) {
                if let Some(mut other) = self.inner.get(&session.session_id).await? {
                    other
                        .filled_values
                        .insert("date".to_string(), json!("2026-12-31"));
                    other.version = expected_version + 1;
                    assert!(self.inner.compare_and_swap(&other, expected_version).await?);
                }
            }
            self.inner.compare_and_swap(session, expected_version).await
        }

        async fn delete(&self, session_id: &str) -> Result<bool> {
            self.inner.delete(session_id).await
        }

        async fn list_by_template(&self, template_id: &str) -> Result<Vec<DraftSession>> {
            self.inner.list_by_template(template_id).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_completion_renders_latest_persisted_answers() {
        let templates = Arc::new(TemplateStore::new(
            Arc::new(InMemoryTemplateIndex::new()),
            Arc::new(ConstantEmbedder),
        ));
        let repo = Arc::new(RacingRepository {
            inner: InMemorySessionRepository::new(),
            raced: AtomicBool::new(false),
        });
        let sessions = Arc::new(SessionStore::new(repo.clone(), templates.clone()));
        let template = templates
            .create(NewTemplate {
                title: "Notice".to_string(),
                doc_type: "Notice".to_string(),
                jurisdiction: "IN".to_string(),
                description: String::new(),
                body: "Dear {{recipient}}, notice dated {{date}}.".to_string(),
                variables: vec![
                    VariableDefinition::new("recipient", VariableType::Text),
                    VariableDefinition::new("date", VariableType::Date),
                ],
                tags: vec![],
                embedding_seed_text: None,
            })
            .await
            .unwrap();
        let workflow = DraftWorkflow::new(templates, sessions);

        let view = workflow.start(&template.id, FilledValues::new()).await.unwrap();
        let id = view.session.session_id;

        let submission = workflow
            .submit_answers(
                &id,
                answers(&[("recipient", json!("Acme Corp")), ("date", json!("2025-01-01"))]),
            )
            .await
            .unwrap();
        let (session, rendered) = match submission {
            Submission::Completed { session, rendered } => (session, rendered),
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(rendered, "Dear Acme Corp, notice dated 2026-12-31.");

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(stored, session);
        assert_eq!(stored.filled_values["date"], json!("2026-12-31"));
        assert_eq!(
            stored.final_draft.as_deref(),
            Some(render_body(&template.body, &stored.filled_values).as_str())
        );
        assert_eq!(stored.version, 3);
    }

    #[test]
    fn test_completed_elsewhere_with_our_answers() {
        let mut session = DraftSession::new(
            "s1".to_string(),
            "t1".to_string(),
            answers(&[("v1", json!("a"))]),
        );
        session.status = SessionStatus::Completed;
        session.final_draft = Some("a".to_string());

        match completed_elsewhere(session.clone(), &answers(&[("v1", json!("a"))])).unwrap() {
            Submission::Completed { rendered, .. } => assert_eq!(rendered, "a"),
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(matches!(
            completed_elsewhere(session, &answers(&[("v1", json!("b"))])),
            Err(DraftingError::InvalidTransition { .. })
        ));
    }
}
