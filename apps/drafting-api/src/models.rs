//! Request and response bodies

use drafting_core::questions::{questions_for, Question};
use drafting_core::workflow::{DraftState, SessionView, Submission};
use drafting_core::{DraftSession, FilledValues, VariableDefinition};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub template_count: usize,
    pub session_store: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTemplatesQuery {
    pub doc_type: Option<String>,
    pub jurisdiction: Option<String>,
}

/// Raw document text to analyse into a template
#[derive(Debug, Deserialize)]
pub struct IngestTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct StartDraftRequest {
    /// Free-text description of the document wanted
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub template_id: String,
    #[serde(default)]
    pub values: FilledValues,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: FilledValues,
}

/// Session with its derived state and outstanding questions
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: DraftSession,
    pub state: DraftState,
    pub missing: Vec<VariableDefinition>,
    pub questions: Vec<Question>,
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        let questions = questions_for(&view.missing.iter().collect::<Vec<_>>());
        Self {
            session: view.session,
            state: view.state,
            missing: view.missing,
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub session_id: String,
    pub missing: Vec<VariableDefinition>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub session: DraftSession,
    pub state: DraftState,
    pub missing: Vec<VariableDefinition>,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        match submission {
            Submission::NeedsAnswers { session, missing } => Self {
                questions: questions_for(&missing.iter().collect::<Vec<_>>()),
                session,
                state: DraftState::AwaitingAnswers,
                missing,
                rendered: None,
            },
            Submission::Completed { session, rendered } => Self {
                session,
                state: DraftState::Completed,
                missing: vec![],
                questions: vec![],
                rendered: Some(rendered),
            },
        }
    }
}
