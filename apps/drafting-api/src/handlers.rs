//! HTTP handlers for the Drafting API
//!
//! Each handler maps onto one core operation; no business logic lives here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use drafting_core::questions::questions_for;
use drafting_core::{NewTemplate, Resolution, Template, TemplateFilter, TemplateSummary};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let template_count = state.templates.count().await?;
    state.sessions.ping().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        template_count,
        session_store: "ok".to_string(),
    }))
}

/// Create a template from an already-analysed document
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTemplate>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    let mut template = state.templates.create(req).await?;
    template.embedding.clear();
    Ok((StatusCode::CREATED, Json(template)))
}

/// Create a template from raw document text via content understanding
pub async fn ingest_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestTextRequest>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    let mut template = state.resolver.ingest_text(&req.text).await?;
    template.embedding.clear();
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<Vec<TemplateSummary>>, ApiError> {
    let filter = TemplateFilter {
        doc_type: query.doc_type,
        jurisdiction: query.jurisdiction,
    };
    Ok(Json(state.templates.list(&filter).await?))
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Template>, ApiError> {
    let mut template = state.templates.get_by_id(&id).await?;
    template.embedding.clear();
    Ok(Json(template))
}

/// Resolve a free-text request to a template
pub async fn start_draft(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartDraftRequest>,
) -> Result<Json<Resolution>, ApiError> {
    Ok(Json(state.resolver.resolve(&req.query).await?))
}

/// Open a session on a chosen template
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let view = state.workflow.start(&req.template_id, req.values).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    Ok(Json(state.workflow.view(&id).await?.into()))
}

pub async fn get_questions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let missing = state.workflow.missing(&id).await?;
    let questions = questions_for(&missing.iter().collect::<Vec<_>>());
    Ok(Json(QuestionsResponse {
        session_id: id,
        missing,
        questions,
    }))
}

pub async fn submit_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = state.workflow.submit_answers(&id, req.answers).await?;
    Ok(Json(submission.into()))
}
