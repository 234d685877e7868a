use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::rag::PageInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexPageRequest {
    pub url: String,
    /// Already cleaned page text; when absent the page is fetched.
    pub text: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub url: String,
}

pub async fn index_page(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IndexPageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = payload.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    let page = match payload.text {
        Some(text) => PageInput {
            cleaned_text: text,
            source_url: url.to_string(),
            title: payload
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Untitled Page".to_string()),
        },
        None => state.fetcher.fetch(url).await?,
    };

    let report = state.rag.index_page(page).await?;
    Ok(Json(report))
}

pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.rag.remove_page(&query.url).await?;
    Ok(Json(json!({ "url": query.url, "deleted": deleted })))
}

pub async fn page_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.rag.page_count(Some(query.url.trim())).await?;
    Ok(Json(json!({
        "url": query.url,
        "indexed": chunks > 0,
        "chunks": chunks,
    })))
}
