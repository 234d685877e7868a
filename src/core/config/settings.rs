//! Typed view over the `rag`, `remote` and `server` config sections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::validate_config;
use crate::core::errors::RagError;

pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    None,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub embedder_backend: EmbedderBackend,
    pub generation_backend: GenerationBackend,
    pub storage_backend: StorageBackend,
    /// Vector length of the local hashing embedder.
    pub embedding_dimension: usize,
    /// Prior turns replayed into the generation prompt.
    pub history_turns: usize,
    /// Distinct question terms a chunk must share for a fallback answer.
    pub fallback_min_overlap: usize,
    /// Share of a generated answer's terms that must occur in the chunks.
    pub grounding_min_support: f64,
    pub session_ttl_secs: u64,
    pub session_sweep_secs: u64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_k: 4,
            embedder_backend: EmbedderBackend::Local,
            generation_backend: GenerationBackend::None,
            storage_backend: StorageBackend::Sqlite,
            embedding_dimension: 384,
            history_turns: 3,
            fallback_min_overlap: 1,
            grounding_min_support: 1.0,
            session_ttl_secs: 1800,
            session_sweep_secs: 60,
        }
    }
}

impl RagSettings {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_k == 0 {
            return Err(RagError::Configuration(
                "retrieval_k must be greater than zero".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(RagError::Configuration(
                "embedding_dimension must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.grounding_min_support) {
            return Err(RagError::Configuration(
                "grounding_min_support must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            request_timeout_secs: 30,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub fetch_timeout_secs: u64,
    /// Browser origins allowed by CORS; empty means local dev origins.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            fetch_timeout_secs: 10,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub rag: RagSettings,
    pub remote: RemoteSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Validates and deserializes a merged config tree. Missing sections
    /// and keys fall back to their defaults.
    pub fn from_value(config: &Value) -> Result<Self, RagError> {
        validate_config(config)?;

        let rag: RagSettings = section(config, "rag")?;
        let remote: RemoteSettings = section(config, "remote")?;
        let server: ServerSettings = section(config, "server")?;

        rag.validate()?;

        Ok(Self {
            rag,
            remote,
            server,
        })
    }
}

fn section<T>(config: &Value, key: &str) -> Result<T, RagError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match config.get(key) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| RagError::Configuration(format!("Invalid config at '{}': {}", key, err))),
        None => Ok(T::default()),
    }
}
