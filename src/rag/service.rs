//! Indexing and question answering over indexed pages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::chunker::{ChunkerConfig, TextChunker};
use super::embedder::Embedder;
use super::retriever::Retriever;
use super::store::VectorIndex;
use super::synthesizer::{lexical_overlap, AnswerMode, AnswerSynthesizer, SynthesizerConfig};
use super::text::significant_terms;
use super::types::{
    ChunkMetadata, EmbeddedChunk, IndexReport, PageInput, RetrievalResult, ScoredChunk,
    VectorRecord,
};
use crate::core::config::Settings;
use crate::core::errors::RagError;
use crate::llm::Generator;
use crate::memory::{ConversationTurn, SessionStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutcome {
    pub answer: String,
    pub mode: AnswerMode,
    pub retrieval: RetrievalResult,
    /// Set when the question could not be embedded and the chunks were
    /// ranked lexically instead.
    pub search_unavailable: bool,
}

pub struct RagService {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    sessions: Arc<SessionStore>,
    history_turns: usize,
}

impl RagService {
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Option<Arc<dyn Generator>>,
        sessions: Arc<SessionStore>,
    ) -> Result<Self, RagError> {
        let chunker = TextChunker::new(ChunkerConfig {
            chunk_size: settings.rag.chunk_size,
            chunk_overlap: settings.rag.chunk_overlap,
        })?;
        let retriever = Retriever::new(embedder.clone(), index.clone(), settings.rag.retrieval_k);
        let synthesizer = AnswerSynthesizer::new(
            generator,
            SynthesizerConfig::from_settings(
                &settings.rag,
                Duration::from_secs(settings.remote.request_timeout_secs.max(1)),
            ),
        );

        Ok(Self {
            chunker,
            embedder,
            index,
            retriever,
            synthesizer,
            sessions,
            history_turns: settings.rag.history_turns,
        })
    }

    /// Drops stored vectors produced by a different embedder.
    pub async fn prepare(&self) -> Result<(), RagError> {
        let fingerprint = self.embedder.fingerprint();
        if self.index.reset_for_model(&fingerprint).await? {
            tracing::warn!(
                "Embedder fingerprint changed to {}; previously indexed pages must be re-indexed",
                fingerprint
            );
        }
        Ok(())
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn index_backend(&self) -> &str {
        self.index.backend()
    }

    pub fn has_generator(&self) -> bool {
        self.synthesizer.has_generator()
    }

    /// Chunk, embed and store a page, replacing any earlier version of it.
    ///
    /// A page without text fails with `NoContent` and leaves the stored
    /// version untouched.
    pub async fn index_page(&self, page: PageInput) -> Result<IndexReport, RagError> {
        let source_url = page.source_url.trim();
        if source_url.is_empty() {
            return Err(RagError::InvalidQuery("source_url must not be empty".to_string()));
        }

        let metadata = ChunkMetadata::new(source_url, page.title.trim());
        let chunks = self.chunker.chunk(&page.cleaned_text, &metadata);
        if chunks.is_empty() {
            return Err(RagError::NoContent(format!("{} has no text to index", source_url)));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "{} returned {} vectors for {} chunks",
                self.embedder.name(),
                vectors.len(),
                chunks.len()
            )));
        }
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);

        let created_at = Utc::now();
        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord::from_embedded(EmbeddedChunk { chunk, vector }, created_at))
            .collect();

        let chunks_indexed = self.index.upsert(source_url, records).await?;
        tracing::info!(
            "Indexed {} chunks of {} ({} dims, {} index)",
            chunks_indexed,
            source_url,
            dimension,
            self.index.backend()
        );

        Ok(IndexReport {
            source_url: source_url.to_string(),
            title: metadata.title,
            chunks_indexed,
            dimension,
        })
    }

    /// Answer `question` from the chunks of `source_url` and record the
    /// turn in the session.
    pub async fn ask(
        &self,
        session_id: &str,
        source_url: &str,
        question: &str,
    ) -> Result<AskOutcome, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuery("question must not be empty".to_string()));
        }
        let source_url = source_url.trim();

        let (retrieval, search_unavailable) =
            match self.retriever.retrieve(question, None, source_url).await {
                Ok(result) => (result, false),
                Err(RagError::EmbeddingUnavailable(reason)) => {
                    tracing::warn!(
                        "Question embedding unavailable ({}); ranking {} lexically",
                        reason,
                        source_url
                    );
                    let result = self
                        .lexical_retrieve(question, source_url, self.retriever.default_k())
                        .await?;
                    (result, true)
                }
                Err(err) => return Err(err),
            };

        let history = self
            .sessions
            .history(session_id, Some(self.history_turns))
            .await;
        let synthesis = self
            .synthesizer
            .synthesize(question, &retrieval, &history)
            .await;

        self.sessions
            .append(session_id, ConversationTurn::new(question, synthesis.answer.clone()))
            .await;

        Ok(AskOutcome {
            answer: synthesis.answer,
            mode: synthesis.mode,
            retrieval,
            search_unavailable,
        })
    }

    /// Rank the stored chunks of one page by shared significant terms.
    async fn lexical_retrieve(
        &self,
        question: &str,
        source_url: &str,
        k: usize,
    ) -> Result<RetrievalResult, RagError> {
        let question_terms = significant_terms(question);
        if question_terms.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let mut hits: Vec<ScoredChunk> = self
            .index
            .partition(source_url)
            .await?
            .into_iter()
            .filter_map(|chunk| {
                let overlap = lexical_overlap(&question_terms, &chunk.text);
                (overlap > 0).then(|| ScoredChunk {
                    score: overlap as f32 / question_terms.len() as f32,
                    chunk,
                })
            })
            .collect();

        // partition is in sequence order, so a stable sort keeps ties by position
        hits.sort_by(|a, b| crate::vector_math::compare_scores(a.score, b.score));
        hits.truncate(k);
        Ok(RetrievalResult::new(hits))
    }

    pub async fn remove_page(&self, source_url: &str) -> Result<usize, RagError> {
        let deleted = self.index.delete(source_url.trim()).await?;
        tracing::info!("Removed {} chunks of {}", deleted, source_url);
        Ok(deleted)
    }

    pub async fn page_count(&self, source_url: Option<&str>) -> Result<usize, RagError> {
        self.index.count(source_url).await
    }

    pub async fn history(&self, session_id: &str, limit: Option<usize>) -> Vec<ConversationTurn> {
        self.sessions.history(session_id, limit).await
    }

    pub async fn reset_session(&self, session_id: &str) -> bool {
        self.sessions.reset(session_id).await
    }
}
