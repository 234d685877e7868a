//! Data carried through the indexing and query paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Provenance attached to every chunk of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_url: String,
    pub title: String,
}

impl ChunkMetadata {
    pub fn new(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: title.into(),
        }
    }
}

/// A bounded segment of page text. `text` is exactly the source
/// characters `[char_start, char_end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_url: String,
    pub title: String,
    pub sequence_index: usize,
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    pub fn new(
        text: String,
        metadata: &ChunkMetadata,
        sequence_index: usize,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        let id = chunk_id(&metadata.source_url, sequence_index, char_start, char_end, &text);
        Self {
            id,
            text,
            source_url: metadata.source_url.clone(),
            title: metadata.title.clone(),
            sequence_index,
            char_start,
            char_end,
        }
    }

    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Stable key so identical content re-indexes onto identical ids.
fn chunk_id(
    source_url: &str,
    sequence_index: usize,
    char_start: usize,
    char_end: usize,
    text: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hasher.update([0u8]);
    hasher.update((sequence_index as u64).to_le_bytes());
    hasher.update((char_start as u64).to_le_bytes());
    hasher.update((char_end as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Persisted unit of the vector index, keyed by `(source_url, chunk.id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn from_embedded(embedded: EmbeddedChunk, created_at: DateTime<Utc>) -> Self {
        Self {
            chunk: embedded.chunk,
            vector: embedded.vector,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity, higher is better.
    pub score: f32,
}

/// Search hits sorted by descending score, ties by ascending
/// `sequence_index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }
}

/// A cleaned page handed over by the fetcher or an API caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInput {
    pub cleaned_text: String,
    pub source_url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub source_url: String,
    pub title: String,
    pub chunks_indexed: usize,
    pub dimension: usize,
}
