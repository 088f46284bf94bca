//! Error types for the Drafting API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drafting_core::DraftingError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Drafting(#[from] DraftingError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        let ApiError::Drafting(err) = self;

        match err {
            DraftingError::NotFound { .. } | DraftingError::NoTemplateFound(_) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            DraftingError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            DraftingError::InvalidTransition { .. } | DraftingError::Conflict { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            DraftingError::UpstreamUnavailable { service, reason } => {
                tracing::warn!("Upstream {} unavailable: {}", service, reason);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{} service unavailable", service),
                )
            }
            DraftingError::Corrupted { id, reason } => {
                tracing::error!("Corrupted record {}: {}", id, reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Stored record is corrupted".to_string(),
                )
            }
            DraftingError::Storage(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
