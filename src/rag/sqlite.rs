//! SQLite-backed vector index.
//!
//! Chunk text and metadata live in SQLite; embeddings are little-endian
//! f32 blobs scored by brute-force cosine similarity.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{rank, validate_search, SearchFilter, VectorIndex};
use super::types::{Chunk, RetrievalResult, VectorRecord};
use crate::core::config::AppPaths;
use crate::core::errors::RagError;

const FINGERPRINT_KEY: &str = "embedder_fingerprint";

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteVectorIndex {
    pub async fn new(paths: &AppPaths) -> Result<Self, RagError> {
        Self::with_path(paths.vector_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::storage)?;

        let index = Self { pool, db_path };
        index.init_schema().await?;
        Ok(index)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_records (
                source_url TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                sequence_index INTEGER NOT NULL,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (source_url, chunk_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_vector_records_seq
             ON vector_records(source_url, sequence_index)",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk, sqlx::Error> {
        let sequence_index: i64 = row.try_get("sequence_index")?;
        let char_start: i64 = row.try_get("char_start")?;
        let char_end: i64 = row.try_get("char_end")?;

        Ok(Chunk {
            id: row.try_get("chunk_id")?,
            text: row.try_get("text")?,
            source_url: row.try_get("source_url")?,
            title: row.try_get("title")?,
            sequence_index: sequence_index.max(0) as usize,
            char_start: char_start.max(0) as usize,
            char_end: char_end.max(0) as usize,
        })
    }

    /// Decodes one row; `None` for rows that cannot be used.
    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Option<(Chunk, Vec<f32>)> {
        let chunk = match Self::row_to_chunk(row) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("Skipping undecodable vector record: {}", err);
                return None;
            }
        };
        let bytes: Vec<u8> = row.try_get("embedding").unwrap_or_default();
        match Self::deserialize_embedding(&bytes) {
            Some(vector) => Some((chunk, vector)),
            None => {
                tracing::warn!(
                    "Skipping chunk {} of {}: malformed embedding blob ({} bytes)",
                    chunk.id,
                    chunk.source_url,
                    bytes.len()
                );
                None
            }
        }
    }

    async fn stored_fingerprint(&self) -> Result<Option<String>, RagError> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?1")
            .bind(FINGERPRINT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::storage)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn upsert(
        &self,
        source_url: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        sqlx::query("DELETE FROM vector_records WHERE source_url = ?1")
            .bind(source_url)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;

        for record in &records {
            let blob = Self::serialize_embedding(&record.vector);
            let chunk = &record.chunk;

            sqlx::query(
                "INSERT OR REPLACE INTO vector_records
                 (source_url, chunk_id, title, sequence_index, char_start, char_end, text, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(source_url)
            .bind(&chunk.id)
            .bind(&chunk.title)
            .bind(chunk.sequence_index as i64)
            .bind(chunk.char_start as i64)
            .bind(chunk.char_end as i64)
            .bind(&chunk.text)
            .bind(&blob)
            .bind(record.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        }

        tx.commit().await.map_err(RagError::storage)?;
        Ok(records.len())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalResult, RagError> {
        validate_search(query, k)?;

        let source_url = filter.and_then(|f| f.source_url.as_deref());
        let rows = if let Some(source_url) = source_url {
            sqlx::query(
                "SELECT source_url, chunk_id, title, sequence_index, char_start, char_end, text, embedding
                 FROM vector_records
                 WHERE source_url = ?1",
            )
            .bind(source_url)
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::storage)?
        } else {
            sqlx::query(
                "SELECT source_url, chunk_id, title, sequence_index, char_start, char_end, text, embedding
                 FROM vector_records",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::storage)?
        };

        let decoded: Vec<(Chunk, Vec<f32>)> = rows.iter().filter_map(Self::decode_row).collect();

        Ok(rank(
            query,
            k,
            decoded.iter().map(|(chunk, vector)| (chunk, vector.as_slice())),
        ))
    }

    async fn delete(&self, source_url: &str) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM vector_records WHERE source_url = ?1")
            .bind(source_url)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, source_url: Option<&str>) -> Result<usize, RagError> {
        let count: i64 = if let Some(source_url) = source_url {
            sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE source_url = ?1")
                .bind(source_url)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM vector_records")
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?
        };

        Ok(count as usize)
    }

    async fn partition(&self, source_url: &str) -> Result<Vec<Chunk>, RagError> {
        let rows = sqlx::query(
            "SELECT source_url, chunk_id, title, sequence_index, char_start, char_end, text
             FROM vector_records
             WHERE source_url = ?1
             ORDER BY sequence_index ASC",
        )
        .bind(source_url)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(rows
            .iter()
            .filter_map(|row| match Self::row_to_chunk(row) {
                Ok(chunk) => Some(chunk),
                Err(err) => {
                    tracing::warn!("Skipping undecodable chunk of {}: {}", source_url, err);
                    None
                }
            })
            .collect())
    }

    async fn reset_for_model(&self, fingerprint: &str) -> Result<bool, RagError> {
        let previous = self.stored_fingerprint().await?;
        if previous.as_deref() == Some(fingerprint) {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        let cleared = match previous {
            Some(_) => {
                sqlx::query("DELETE FROM vector_records")
                    .execute(&mut *tx)
                    .await
                    .map_err(RagError::storage)?
                    .rows_affected()
            }
            None => 0,
        };

        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(FINGERPRINT_KEY)
        .bind(fingerprint)
        .execute(&mut *tx)
        .await
        .map_err(RagError::storage)?;

        tx.commit().await.map_err(RagError::storage)?;

        if cleared > 0 {
            tracing::info!(
                "Embedder changed to {}; cleared {} stored vectors",
                fingerprint,
                cleared
            );
        }
        Ok(cleared > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::ChunkMetadata;
    use chrono::Utc;

    fn temp_db() -> PathBuf {
        std::env::temp_dir().join(format!("pagechat-index-test-{}.db", uuid::Uuid::new_v4()))
    }

    async fn test_index() -> SqliteVectorIndex {
        SqliteVectorIndex::with_path(temp_db()).await.unwrap()
    }

    fn record(url: &str, seq: usize, text: &str, vector: Vec<f32>) -> VectorRecord {
        let meta = ChunkMetadata::new(url, "Page");
        let start = seq * 100;
        let chunk = Chunk::new(text.to_string(), &meta, seq, start, start + text.chars().count());
        VectorRecord {
            chunk,
            vector,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_and_search_scoped_to_url() {
        let index = test_index().await;

        index
            .upsert(
                "https://a.example",
                vec![
                    record("https://a.example", 0, "alpha", vec![1.0, 0.0]),
                    record("https://a.example", 1, "beta", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        index
            .upsert(
                "https://b.example",
                vec![record("https://b.example", 0, "gamma", vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let filter = SearchFilter::source("https://a.example");
        let result = index.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].chunk.text, "alpha");
        assert!(result.hits[0].score > 0.99);
        assert!(result
            .chunks()
            .all(|chunk| chunk.source_url == "https://a.example"));
        assert_eq!(index.count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reindexing_same_content_is_idempotent() {
        let index = test_index().await;
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
        assert_eq!(index.partition(url).await.unwrap().len(), 2);
        assert_eq!(index.count(Some(url)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_the_whole_partition() {
        let index = test_index().await;
        let url = "https://a.example";

        index
            .upsert(
                url,
                vec![
                    record(url, 0, "old one", vec![1.0, 0.0]),
                    record(url, 1, "old two", vec![1.0, 0.0]),
                    record(url, 2, "old three", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        index
            .upsert(url, vec![record(url, 0, "new", vec![1.0, 0.0])])
            .await
            .unwrap();

        let chunks = index.partition(url).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "new");
    }

    #[tokio::test]
    async fn ties_break_by_sequence_index() {
        let index = test_index().await;
        let url = "https://a.example";

        index
            .upsert(
                url,
                vec![
                    record(url, 2, "third", vec![1.0, 0.0]),
                    record(url, 0, "first", vec![1.0, 0.0]),
                    record(url, 1, "second", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let result = index
            .search(&[1.0, 0.0], 3, Some(&SearchFilter::source(url)))
            .await
            .unwrap();
        let order: Vec<usize> = result.chunks().map(|c| c.sequence_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn search_rejects_zero_k_and_empty_query() {
        let index = test_index().await;
        assert!(matches!(
            index.search(&[1.0], 0, None).await,
            Err(RagError::InvalidQuery(_))
        ));
        assert!(matches!(
            index.search(&[], 4, None).await,
            Err(RagError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn search_on_empty_index_is_empty() {
        let index = test_index().await;
        let result = index
            .search(&[1.0, 0.0], 4, Some(&SearchFilter::source("https://none")))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_only_one_partition() {
        let index = test_index().await;
        index
            .upsert("https://a", vec![record("https://a", 0, "a", vec![1.0])])
            .await
            .unwrap();
        index
            .upsert("https://b", vec![record("https://b", 0, "b", vec![1.0])])
            .await
            .unwrap();

        assert_eq!(index.delete("https://a").await.unwrap(), 1);
        assert_eq!(index.delete("https://a").await.unwrap(), 0);
        assert_eq!(index.count(Some("https://b")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let path = temp_db();
        {
            let index = SqliteVectorIndex::with_path(path.clone()).await.unwrap();
            index
                .upsert("https://a", vec![record("https://a", 0, "kept", vec![0.6, 0.8])])
                .await
                .unwrap();
            index.pool.close().await;
        }

        let reopened = SqliteVectorIndex::with_path(path).await.unwrap();
        let result = reopened
            .search(&[0.6, 0.8], 1, Some(&SearchFilter::source("https://a")))
            .await
            .unwrap();
        assert_eq!(result.hits[0].chunk.text, "kept");
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped() {
        let index = test_index().await;
        index
            .upsert(
                "https://a",
                vec![
                    record("https://a", 0, "good", vec![1.0, 0.0]),
                    record("https://a", 1, "bad", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        index
            .upsert("https://b", vec![record("https://b", 0, "other", vec![1.0, 0.0])])
            .await
            .unwrap();

        sqlx::query("UPDATE vector_records SET embedding = ?1 WHERE text = 'bad'")
            .bind(vec![1u8, 2, 3])
            .execute(&index.pool)
            .await
            .unwrap();

        let a = index
            .search(&[1.0, 0.0], 4, Some(&SearchFilter::source("https://a")))
            .await
            .unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.hits[0].chunk.text, "good");

        let b = index
            .search(&[1.0, 0.0], 4, Some(&SearchFilter::source("https://b")))
            .await
            .unwrap();
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn reset_for_model_clears_on_fingerprint_change() {
        let index = test_index().await;

        assert!(!index.reset_for_model("local:sha256-hashing:4").await.unwrap());
        index
            .upsert("https://a", vec![record("https://a", 0, "a", vec![1.0])])
            .await
            .unwrap();

        assert!(!index.reset_for_model("local:sha256-hashing:4").await.unwrap());
        assert_eq!(index.count(None).await.unwrap(), 1);

        assert!(index.reset_for_model("remote:x:embed-v2").await.unwrap());
        assert_eq!(index.count(None).await.unwrap(), 0);
        assert_eq!(
            index.stored_fingerprint().await.unwrap().as_deref(),
            Some("remote:x:embed-v2")
        );
    }
}
