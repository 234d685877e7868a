//! VectorIndex trait: storage of embedded chunks partitioned by source URL.
//!
//! Implementations: `SqliteVectorIndex` (persistent) and
//! `MemoryVectorIndex` (process-local).

use async_trait::async_trait;

use super::types::{Chunk, RetrievalResult, ScoredChunk, VectorRecord};
use crate::core::errors::RagError;
use crate::vector_math::{compare_scores, cosine_similarity};

/// Restricts a search to one partition.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub source_url: Option<String>,
}

impl SearchFilter {
    pub fn source(source_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
        }
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &str;

    /// Replace every record of `source_url` with `records` in one step.
    /// Readers see either the old or the new partition, never a mix.
    async fn upsert(&self, source_url: &str, records: Vec<VectorRecord>)
        -> Result<usize, RagError>;

    /// Top `k` records by cosine similarity.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalResult, RagError>;

    /// Remove the partition of `source_url`. Returns the number of records removed.
    async fn delete(&self, source_url: &str) -> Result<usize, RagError>;

    async fn count(&self, source_url: Option<&str>) -> Result<usize, RagError>;

    /// Stored chunks of one URL ordered by `sequence_index`.
    async fn partition(&self, source_url: &str) -> Result<Vec<Chunk>, RagError>;

    /// Clear all partitions when the stored embedder fingerprint differs
    /// from `fingerprint`, then record `fingerprint`. Returns whether
    /// anything was cleared.
    async fn reset_for_model(&self, fingerprint: &str) -> Result<bool, RagError>;
}

pub(crate) fn validate_search(query: &[f32], k: usize) -> Result<(), RagError> {
    if k == 0 {
        return Err(RagError::InvalidQuery("k must be greater than zero".to_string()));
    }
    if query.is_empty() {
        return Err(RagError::InvalidQuery("query vector is empty".to_string()));
    }
    Ok(())
}

/// Score `candidates` against `query` and keep the best `k`.
///
/// Candidates whose dimension differs from the query are skipped.
pub(crate) fn rank<'a, I>(query: &[f32], k: usize, candidates: I) -> RetrievalResult
where
    I: IntoIterator<Item = (&'a Chunk, &'a [f32])>,
{
    let mut hits: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter_map(|(chunk, vector)| match cosine_similarity(query, vector) {
            Ok(score) => Some(ScoredChunk {
                chunk: chunk.clone(),
                score,
            }),
            Err(err) => {
                tracing::warn!(
                    "Skipping chunk {} of {}: {}",
                    chunk.id,
                    chunk.source_url,
                    err
                );
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        compare_scores(a.score, b.score)
            .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
            .then_with(|| a.chunk.source_url.cmp(&b.chunk.source_url))
    });
    hits.truncate(k);

    RetrievalResult::new(hits)
}
