use std::sync::Arc;

use super::embedder::Embedder;
use super::store::{SearchFilter, VectorIndex};
use super::types::RetrievalResult;
use crate::core::errors::RagError;

/// Embeds a question and searches one page's partition.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, default_k: usize) -> Self {
        Self {
            embedder,
            index,
            default_k,
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub async fn retrieve(
        &self,
        question: &str,
        k: Option<usize>,
        source_url: &str,
    ) -> Result<RetrievalResult, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuery("question must not be empty".to_string()));
        }
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(RagError::InvalidQuery("k must be greater than zero".to_string()));
        }

        let query = self.embedder.embed_query(question).await?;
        // a question with no terms embeds to the zero vector: nothing can match
        if query.iter().all(|value| *value == 0.0) {
            tracing::debug!("Question has no embeddable terms; returning no hits");
            return Ok(RetrievalResult::empty());
        }

        let result = self
            .index
            .search(&query, k, Some(&SearchFilter::source(source_url)))
            .await?;

        tracing::debug!(
            "Retrieved {} of at most {} chunks for {}",
            result.len(),
            k,
            source_url
        );
        Ok(result)
    }
}
