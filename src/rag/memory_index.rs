//! Process-local vector index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{rank, validate_search, SearchFilter, VectorIndex};
use super::types::{Chunk, RetrievalResult, VectorRecord};
use crate::core::errors::RagError;

/// Partitions are immutable `Arc<Vec<_>>` snapshots. An upsert builds the
/// new partition off-lock and swaps it in, so searches holding the old
/// snapshot finish against consistent data.
#[derive(Default)]
pub struct MemoryVectorIndex {
    partitions: RwLock<HashMap<String, Arc<Vec<VectorRecord>>>>,
    fingerprint: RwLock<Option<String>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self, filter: Option<&SearchFilter>) -> Vec<Arc<Vec<VectorRecord>>> {
        let partitions = self.partitions.read().await;
        match filter.and_then(|f| f.source_url.as_deref()) {
            Some(url) => partitions.get(url).cloned().into_iter().collect(),
            None => partitions.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn upsert(
        &self,
        source_url: &str,
        mut records: Vec<VectorRecord>,
    ) -> Result<usize, RagError> {
        records.sort_by_key(|record| record.chunk.sequence_index);
        let count = records.len();
        let partition = Arc::new(records);

        let mut partitions = self.partitions.write().await;
        if count == 0 {
            partitions.remove(source_url);
        } else {
            partitions.insert(source_url.to_string(), partition);
        }
        Ok(count)
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalResult, RagError> {
        validate_search(query, k)?;

        let snapshot = self.snapshot(filter).await;
        Ok(rank(
            query,
            k,
            snapshot
                .iter()
                .flat_map(|partition| partition.iter())
                .map(|record| (&record.chunk, record.vector.as_slice())),
        ))
    }

    async fn delete(&self, source_url: &str) -> Result<usize, RagError> {
        let removed = self.partitions.write().await.remove(source_url);
        Ok(removed.map(|partition| partition.len()).unwrap_or(0))
    }

    async fn count(&self, source_url: Option<&str>) -> Result<usize, RagError> {
        let partitions = self.partitions.read().await;
        Ok(match source_url {
            Some(url) => partitions.get(url).map(|p| p.len()).unwrap_or(0),
            None => partitions.values().map(|p| p.len()).sum(),
        })
    }

    async fn partition(&self, source_url: &str) -> Result<Vec<Chunk>, RagError> {
        let partition = self.partitions.read().await.get(source_url).cloned();
        Ok(partition
            .map(|records| records.iter().map(|record| record.chunk.clone()).collect())
            .unwrap_or_default())
    }

    async fn reset_for_model(&self, fingerprint: &str) -> Result<bool, RagError> {
        let mut current = self.fingerprint.write().await;
        if current.as_deref() == Some(fingerprint) {
            return Ok(false);
        }

        let had_previous = current.is_some();
        *current = Some(fingerprint.to_string());

        if !had_previous {
            return Ok(false);
        }
        let mut partitions = self.partitions.write().await;
        let cleared = !partitions.is_empty();
        partitions.clear();
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::ChunkMetadata;
    use chrono::Utc;

    fn record(url: &str, seq: usize, text: &str, vector: Vec<f32>) -> VectorRecord {
        let meta = ChunkMetadata::new(url, "Page");
        VectorRecord {
            chunk: Chunk::new(text.to_string(), &meta, seq, seq * 10, seq * 10 + text.len()),
            vector,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_and_search_is_scoped() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "https://a",
                vec![
                    record("https://a", 1, "second", vec![1.0, 0.0]),
                    record("https://a", 0, "first", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        index
            .upsert("https://b", vec![record("https://b", 0, "other", vec![1.0, 0.0])])
            .await
            .unwrap();

        let result = index
            .search(&[1.0, 0.0], 4, Some(&SearchFilter::source("https://a")))
            .await
            .unwrap();
        let texts: Vec<&str> = result.chunks().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        index
            .upsert("https://a", vec![record("https://a", 0, "fresh", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.count(Some("https://a")).await.unwrap(), 1);
        assert_eq!(index.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reindexing_same_content_keeps_search_results() {
        let index = MemoryVectorIndex::new();
        let url = "https://a.example";
        let records = || {
            vec![
                record(url, 0, "alpha", vec![1.0, 0.0]),
                record(url, 1, "beta", vec![0.6, 0.8]),
            ]
        };
        let filter = SearchFilter::source(url);
        let hits = |result: RetrievalResult| -> Vec<(String, f32)> {
            result
                .hits
                .into_iter()
                .map(|hit| (hit.chunk.id, hit.score))
                .collect()
        };

        index.upsert(url, records()).await.unwrap();
        let first = hits(index.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap());
        index.upsert(url, records()).await.unwrap();
        let second = hits(index.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap());

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(index.count(Some(url)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn partition_is_ordered_and_delete_is_idempotent() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "https://a",
                vec![
                    record("https://a", 2, "c", vec![1.0]),
                    record("https://a", 0, "a", vec![1.0]),
                    record("https://a", 1, "b", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let seqs: Vec<usize> = index
            .partition("https://a")
            .await
            .unwrap()
            .iter()
            .map(|c| c.sequence_index)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);

        assert_eq!(index.delete("https://a").await.unwrap(), 3);
        assert_eq!(index.delete("https://a").await.unwrap(), 0);
        assert!(index.partition("https://a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reader_snapshot_survives_concurrent_upsert() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("https://a", vec![record("https://a", 0, "old", vec![1.0])])
            .await
            .unwrap();

        let snapshot = index.snapshot(Some(&SearchFilter::source("https://a"))).await;
        index
            .upsert("https://a", vec![record("https://a", 0, "new", vec![1.0])])
            .await
            .unwrap();

        assert_eq!(snapshot[0][0].chunk.text, "old");
        assert_eq!(index.partition("https://a").await.unwrap()[0].text, "new");
    }

    #[tokio::test]
    async fn fingerprint_change_clears_everything() {
        let index = MemoryVectorIndex::new();
        assert!(!index.reset_for_model("local:sha256-hashing:8").await.unwrap());
        index
            .upsert("https://a", vec![record("https://a", 0, "a", vec![1.0])])
            .await
            .unwrap();

        assert!(!index.reset_for_model("local:sha256-hashing:8").await.unwrap());
        assert!(index.reset_for_model("local:sha256-hashing:16").await.unwrap());
        assert_eq!(index.count(None).await.unwrap(), 0);
    }
}
