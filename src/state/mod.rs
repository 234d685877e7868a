use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings, StorageBackend};
use crate::crawler::PageFetcher;
use crate::llm::{build_embedder, build_generator};
use crate::memory::SessionStore;
use crate::rag::{MemoryVectorIndex, RagService, SqliteVectorIndex, VectorIndex};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionStore>,
    pub rag: Arc<RagService>,
    pub fetcher: PageFetcher,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading configuration from the paths' config and secrets files
    /// 2. Opening the vector index and building the embedder/generator
    /// 3. Clearing stored vectors left by a different embedder
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        Self::build(paths, config, settings).await
    }

    pub async fn build(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let index: Arc<dyn VectorIndex> = match settings.rag.storage_backend {
            StorageBackend::Sqlite => Arc::new(
                SqliteVectorIndex::new(paths.as_ref())
                    .await
                    .map_err(|e| InitializationError::Index(e.into()))?,
            ),
            StorageBackend::Memory => Arc::new(MemoryVectorIndex::new()),
        };

        let embedder = build_embedder(&settings).map_err(|e| InitializationError::Llm(e.into()))?;
        let generator =
            build_generator(&settings).map_err(|e| InitializationError::Llm(e.into()))?;

        let sessions = Arc::new(SessionStore::new());
        let rag = RagService::new(&settings, embedder, index, generator, sessions.clone())
            .map_err(|e| InitializationError::Rag(e.into()))?;
        rag.prepare()
            .await
            .map_err(|e| InitializationError::Index(e.into()))?;

        let fetcher = PageFetcher::new(settings.server.fetch_timeout_secs)
            .map_err(|e| InitializationError::Fetcher(e.into()))?;

        tracing::info!(
            "RAG ready: embedder={}, index={}, generator={}",
            rag.embedder_name(),
            rag.index_backend(),
            if rag.has_generator() { "remote" } else { "none" }
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            sessions,
            rag: Arc::new(rag),
            fetcher,
        }))
    }
}
