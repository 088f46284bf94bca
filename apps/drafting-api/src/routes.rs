//! Router construction

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Template endpoints
        .route(
            "/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route("/templates/ingest", post(handlers::ingest_template))
        .route("/templates/:id", get(handlers::get_template))
        // Drafting endpoints
        .route("/drafts/start", post(handlers::start_draft))
        .route("/drafts/sessions", post(handlers::create_session))
        .route("/drafts/sessions/:id", get(handlers::get_session))
        .route(
            "/drafts/sessions/:id/questions",
            get(handlers::get_questions),
        )
        .route(
            "/drafts/sessions/:id/answers",
            post(handlers::submit_answers),
        )
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
