pub mod openai_compat;
pub mod provider;
pub mod types;

use std::sync::Arc;

pub use openai_compat::OpenAiCompatClient;
pub use provider::Generator;
pub use types::{ChatMessage, ChatRequest};

use crate::core::config::{EmbedderBackend, GenerationBackend, Settings};
use crate::core::errors::RagError;
use crate::rag::{Embedder, HashingEmbedder};

/// Embedder selected by `rag.embedder_backend`.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>, RagError> {
    match settings.rag.embedder_backend {
        EmbedderBackend::Local => Ok(Arc::new(HashingEmbedder::new(
            settings.rag.embedding_dimension,
        )?)),
        EmbedderBackend::Remote => Ok(Arc::new(OpenAiCompatClient::new(&settings.remote)?)),
    }
}

/// Generator selected by `rag.generation_backend`; `None` means the
/// synthesizer answers with lexical extracts only.
pub fn build_generator(settings: &Settings) -> Result<Option<Arc<dyn Generator>>, RagError> {
    match settings.rag.generation_backend {
        GenerationBackend::None => Ok(None),
        GenerationBackend::Remote => {
            let has_key = settings
                .remote
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty());
            if !has_key {
                tracing::warn!(
                    "generation_backend is 'remote' but no API key is set; requests to {} may be rejected",
                    settings.remote.base_url
                );
            }
            Ok(Some(Arc::new(OpenAiCompatClient::new(&settings.remote)?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_local_embedder_and_no_generator() {
        let settings = Settings::default();
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.name(), "local");
        assert_eq!(embedder.fingerprint(), "local:sha256-hashing:384");
        assert!(build_generator(&settings).unwrap().is_none());
    }

    #[test]
    fn remote_backends_use_the_compat_client() {
        let mut settings = Settings::default();
        settings.rag.embedder_backend = EmbedderBackend::Remote;
        settings.rag.generation_backend = GenerationBackend::Remote;
        settings.remote.api_key = Some("sk-test".to_string());

        assert_eq!(build_embedder(&settings).unwrap().name(), "remote");
        let generator = build_generator(&settings).unwrap().unwrap();
        assert_eq!(generator.name(), "remote");
    }
}
