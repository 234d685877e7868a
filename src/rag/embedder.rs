//! Embedding capability and the local feature-hashing backend.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::text::terms;
use crate::core::errors::RagError;
use crate::vector_math::normalize;

/// Maps texts to fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// backend name (e.g. "local", "remote")
    fn name(&self) -> &str;

    /// Identity of backend, model and dimension. Vectors produced under
    /// different fingerprints are not comparable.
    fn fingerprint(&self) -> String;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(RagError::EmbeddingUnavailable(format!(
                "{} returned {} vectors for one query",
                self.name(),
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Deterministic bag-of-words embedder that needs no model files.
///
/// Each term is hashed into one of `dimension` signed buckets; the
/// resulting term-frequency vector is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, RagError> {
        if dimension == 0 {
            return Err(RagError::Configuration(
                "embedding_dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for term in terms(text) {
            let digest = Sha256::digest(term.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    fn fingerprint(&self) -> String {
        format!("local:sha256-hashing:{}", self.dimension)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
