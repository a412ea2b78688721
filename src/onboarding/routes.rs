//! REST endpoints for onboarding status, reset and transcripts.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{DatabaseError, Error};

use super::manager::OnboardingManager;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn failure(e: Error) -> Response {
    match e {
        Error::Database(DatabaseError::NotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Error::Onboarding(_) => error_response(StatusCode::CONFLICT, e.to_string()),
        _ => {
            tracing::error!("Onboarding route failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/conversations/{id}/onboarding
///
/// Current phase and collected data, or 404 if the conversation has no
/// onboarding state yet. Corrupt state answers 409 so the caller knows to
/// reset it.
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(conversation_id): Path<Uuid>,
) -> Response {
    match state.manager.status(conversation_id).await {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no onboarding state for conversation {conversation_id}"),
        ),
        Err(e) => failure(e),
    }
}

/// POST /api/conversations/{id}/onboarding/reset
async fn reset(
    State(state): State<OnboardingRouteState>,
    Path(conversation_id): Path<Uuid>,
) -> Response {
    match state.manager.reset(conversation_id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => failure(e),
    }
}

/// GET /api/conversations/{id}/messages
async fn get_messages(
    State(state): State<OnboardingRouteState>,
    Path(conversation_id): Path<Uuid>,
) -> Response {
    match state.manager.history(conversation_id).await {
        Ok(messages) => Json(serde_json::json!({
            "conversation_id": conversation_id,
            "messages": messages,
        }))
        .into_response(),
        Err(e) => failure(e),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/conversations/{id}/onboarding", get(get_status))
        .route("/api/conversations/{id}/onboarding/reset", post(reset))
        .route("/api/conversations/{id}/messages", get(get_messages))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
