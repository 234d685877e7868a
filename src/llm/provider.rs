use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Text generation capability consumed by the answer synthesizer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// return the provider name (e.g. "remote")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn generate(&self, request: ChatRequest) -> Result<String, ApiError>;
}
