use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.rag.page_count(None).await?;
    Ok(Json(json!({
        "status": "ok",
        "embedder": state.rag.embedder_name(),
        "index": state.rag.index_backend(),
        "generator": state.rag.has_generator(),
        "indexed_chunks": chunks,
        "active_sessions": state.sessions.len().await,
    })))
}
