use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub source_url: String,
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.sessions.create().await;
    tracing::debug!("Created session {}", session.session_id);
    Json(session)
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.sessions.info(&session_id).await {
        Some(info) => Ok(Json(info)),
        None => Err(ApiError::NotFound(format!("session {}", session_id))),
    }
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.source_url.trim().is_empty() {
        return Err(ApiError::BadRequest("source_url is required".to_string()));
    }
    let outcome = state
        .rag
        .ask(&session_id, &payload.source_url, &payload.question)
        .await?;
    Ok(Json(outcome))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let turns = state.rag.history(&session_id, query.limit).await;
    Json(json!({
        "session_id": session_id,
        "turns": turns,
    }))
}

pub async fn reset_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let success = state.rag.reset_session(&session_id).await;
    Json(json!({ "success": success }))
}
