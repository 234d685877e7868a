//! Retrieval-augmented question answering over single web pages.
//!
//! - `TextChunker` splits cleaned page text into overlapping chunks
//! - `Embedder` turns chunk text into vectors (`HashingEmbedder` locally)
//! - `VectorIndex` stores vectors per source URL (SQLite or in memory)
//! - `Retriever` and `AnswerSynthesizer` answer questions from one page
//! - `RagService` ties the pieces together for the HTTP layer

mod chunker;
mod embedder;
mod memory_index;
mod retriever;
mod service;
mod sqlite;
mod store;
mod synthesizer;
mod text;
mod types;

pub use chunker::{chunk_text, ChunkerConfig, TextChunker};
pub use embedder::{Embedder, HashingEmbedder};
pub use memory_index::MemoryVectorIndex;
pub use retriever::Retriever;
pub use service::{AskOutcome, RagService};
pub use sqlite::SqliteVectorIndex;
pub use store::{SearchFilter, VectorIndex};
pub use synthesizer::{
    grounding_support, ungrounded_numbers, AnswerMode, AnswerSynthesizer, Synthesis, SynthesizerConfig,
    UNAVAILABLE_ANSWER,
};
pub use text::{significant_terms, split_sentences};
pub use types::{
    Chunk, ChunkMetadata, EmbeddedChunk, IndexReport, PageInput, RetrievalResult, ScoredChunk,
    VectorRecord,
};
