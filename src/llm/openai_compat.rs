use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::Generator;
use super::types::ChatRequest;
use crate::core::config::RemoteSettings;
use crate::core::errors::{ApiError, RagError};
use crate::rag::Embedder;

/// Client for OpenAI-compatible `/embeddings` and `/chat/completions`
/// endpoints (OpenAI, Groq, LM Studio, llama.cpp server, ...).
#[derive(Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    client: Client,
    embedding_model: String,
    chat_model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    batch_size: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiCompatClient {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RagError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", key.trim()))
                .map_err(|_| RagError::Configuration("invalid remote api_key".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RagError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            embedding_model: settings.embedding_model.clone(),
            chat_model: settings.chat_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
            batch_size: settings.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let request = self.client.post(&url).json(&body).send();
        let res = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RagError::EmbeddingUnavailable(format!("{} timed out", url)))?
            .map_err(RagError::embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingUnavailable(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let mut payload: EmbeddingResponse = res.json().await.map_err(RagError::embedding)?;
        payload.data.sort_by_key(|entry| entry.index);
        if payload.data.len() != inputs.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "backend returned {} embeddings for {} inputs",
                payload.data.len(),
                inputs.len()
            )));
        }

        Ok(payload.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    fn name(&self) -> &str {
        "remote"
    }

    fn fingerprint(&self) -> String {
        format!("remote:{}:{}", self.base_url, self.embedding_model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // batches run concurrently; try_join_all keeps their order
        let batches = try_join_all(
            texts
                .chunks(self.batch_size)
                .map(|batch| self.embed_batch(batch)),
        )
        .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(RagError::EmbeddingUnavailable(
                "backend returned empty or inconsistent vectors".to_string(),
            ));
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Generator for OpenAiCompatClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate(&self, request: ChatRequest) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "stream": false,
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ServiceUnavailable(format!(
                "chat completion error: {}",
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|err| ApiError::ServiceUnavailable(format!("malformed chat completion: {err}")))?;

        // a 200 carrying an error body is still a failed call
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ApiError::ServiceUnavailable(format!(
                    "chat completion without message content: {}",
                    payload
                ))
            })?;

        Ok(content.trim().to_string())
    }
}
