use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize vector index: {0}")]
    Index(#[source] anyhow::Error),

    #[error("Failed to initialize LLM backends: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize RAG service: {0}")]
    Rag(#[source] anyhow::Error),

    #[error("Failed to initialize page fetcher: {0}")]
    Fetcher(#[source] anyhow::Error),
}
