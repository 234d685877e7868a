//! Grounded answer synthesis.
//!
//! With a generator configured the retrieved chunks and recent turns are
//! sent as the only allowed context, and the reply is checked against the
//! chunk text before it is returned. Without one (or when it fails) a
//! deterministic extract of the best lexically matching chunk is returned.
//! Anything that cannot be grounded becomes [`UNAVAILABLE_ANSWER`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::text::{significant_terms, split_sentences, terms};
use super::types::{Chunk, RetrievalResult};
use crate::core::config::RagSettings;
use crate::llm::{ChatMessage, ChatRequest, Generator};
use crate::memory::ConversationTurn;

pub const UNAVAILABLE_ANSWER: &str = "The answer is not available on the provided website.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based ONLY on the provided website content.
If the answer to a question is not available in the provided context, respond EXACTLY with:
\"The answer is not available on the provided website.\"

Do not use any external knowledge or make assumptions. Base your answer strictly on the information provided in the context.";

const REFUSAL_PREFIXES: [&str; 2] = ["i don't know", "i'm sorry"];
const MAX_EXTRACT_SENTENCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Generative,
    Fallback,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synthesis {
    pub answer: String,
    pub mode: AnswerMode,
}

impl Synthesis {
    fn unavailable() -> Self {
        Self {
            answer: UNAVAILABLE_ANSWER.to_string(),
            mode: AnswerMode::Unavailable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub history_turns: usize,
    pub fallback_min_overlap: usize,
    pub grounding_min_support: f64,
    pub generation_timeout: Duration,
}

impl SynthesizerConfig {
    pub fn from_settings(rag: &RagSettings, generation_timeout: Duration) -> Self {
        Self {
            history_turns: rag.history_turns,
            fallback_min_overlap: rag.fallback_min_overlap.max(1),
            grounding_min_support: rag.grounding_min_support,
            generation_timeout,
        }
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self::from_settings(&RagSettings::default(), Duration::from_secs(30))
    }
}

pub struct AnswerSynthesizer {
    generator: Option<Arc<dyn Generator>>,
    config: SynthesizerConfig,
}

impl AnswerSynthesizer {
    pub fn new(generator: Option<Arc<dyn Generator>>, config: SynthesizerConfig) -> Self {
        Self { generator, config }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn answer(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        history: &[ConversationTurn],
    ) -> String {
        self.synthesize(question, retrieval, history).await.answer
    }

    /// Never fails: every failure path ends in the fallback extract or
    /// the unavailable answer.
    pub async fn synthesize(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        history: &[ConversationTurn],
    ) -> Synthesis {
        if retrieval.is_empty() {
            return Synthesis::unavailable();
        }

        if let Some(generator) = &self.generator {
            let request = self.build_request(question, retrieval, history);
            let outcome =
                tokio::time::timeout(self.config.generation_timeout, generator.generate(request))
                    .await;

            match outcome {
                Ok(Ok(output)) => {
                    let answer = self.check_generated(&output, retrieval);
                    let mode = if answer == UNAVAILABLE_ANSWER {
                        AnswerMode::Unavailable
                    } else {
                        AnswerMode::Generative
                    };
                    return Synthesis { answer, mode };
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        "Generator {} failed, using lexical fallback: {}",
                        generator.name(),
                        err
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "Generator {} timed out after {:?}, using lexical fallback",
                        generator.name(),
                        self.config.generation_timeout
                    );
                }
            }
        }

        match fallback_extract(question, retrieval, self.config.fallback_min_overlap) {
            Some(answer) => Synthesis {
                answer,
                mode: AnswerMode::Fallback,
            },
            None => Synthesis::unavailable(),
        }
    }

    fn build_request(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        history: &[ConversationTurn],
    ) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

        let skip = history.len().saturating_sub(self.config.history_turns);
        for turn in &history[skip..] {
            messages.push(ChatMessage::user(turn.question.clone()));
            messages.push(ChatMessage::assistant(turn.answer.clone()));
        }

        let context = retrieval
            .chunks()
            .map(|chunk| chunk.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        messages.push(ChatMessage::user(format!(
            "Context from the website:\n{}\n\nQuestion: {}",
            context,
            question.trim()
        )));

        ChatRequest::new(messages)
    }

    fn check_generated(&self, output: &str, retrieval: &RetrievalResult) -> String {
        let answer = output.trim();
        if answer.is_empty() {
            return UNAVAILABLE_ANSWER.to_string();
        }

        let lowered = answer.to_lowercase();
        let refusal = UNAVAILABLE_ANSWER.to_lowercase();
        if lowered.contains(refusal.trim_end_matches('.'))
            || REFUSAL_PREFIXES
                .iter()
                .any(|prefix| lowered.starts_with(prefix))
        {
            return UNAVAILABLE_ANSWER.to_string();
        }

        let missing = ungrounded_numbers(answer, retrieval.chunks());
        if !missing.is_empty() {
            tracing::warn!(
                "Discarding generated answer with numbers absent from the context: {:?}",
                missing
            );
            return UNAVAILABLE_ANSWER.to_string();
        }

        let support = grounding_support(answer, retrieval.chunks());
        if support < self.config.grounding_min_support {
            tracing::warn!(
                "Discarding generated answer with grounding support {:.2} (< {:.2})",
                support,
                self.config.grounding_min_support
            );
            return UNAVAILABLE_ANSWER.to_string();
        }

        answer.to_string()
    }
}

/// Share of the answer's terms that occur somewhere in `chunks`.
///
/// Significant terms are used when the answer has any; otherwise all of
/// its terms. An answer without terms has no support.
pub fn grounding_support<'a>(answer: &str, chunks: impl Iterator<Item = &'a Chunk>) -> f64 {
    let mut answer_terms = significant_terms(answer);
    if answer_terms.is_empty() {
        answer_terms = terms(answer).into_iter().collect();
    }
    if answer_terms.is_empty() {
        return 0.0;
    }

    let grounded: BTreeSet<String> = chunks.flat_map(|chunk| terms(&chunk.text)).collect();
    let supported = answer_terms
        .iter()
        .filter(|term| grounded.contains(*term))
        .count();

    supported as f64 / answer_terms.len() as f64
}

/// Terms of `answer` containing a digit that no chunk contains.
pub fn ungrounded_numbers<'a>(answer: &str, chunks: impl Iterator<Item = &'a Chunk>) -> Vec<String> {
    let numbers: BTreeSet<String> = terms(answer)
        .into_iter()
        .filter(|term| term.chars().any(|c| c.is_ascii_digit()))
        .collect();
    if numbers.is_empty() {
        return Vec::new();
    }

    let grounded: BTreeSet<String> = chunks.flat_map(|chunk| terms(&chunk.text)).collect();
    numbers
        .into_iter()
        .filter(|number| !grounded.contains(number))
        .collect()
}

/// Number of distinct `question_terms` present in `text`.
pub fn lexical_overlap(question_terms: &BTreeSet<String>, text: &str) -> usize {
    let text_terms: BTreeSet<String> = terms(text).into_iter().collect();
    question_terms
        .iter()
        .filter(|term| text_terms.contains(*term))
        .count()
}

/// Up to three sentences of the best matching chunk that mention a
/// question term, in source order. Ties go to the earlier retrieval rank.
fn fallback_extract(
    question: &str,
    retrieval: &RetrievalResult,
    min_overlap: usize,
) -> Option<String> {
    let question_terms = significant_terms(question);
    if question_terms.is_empty() {
        return None;
    }

    let mut best: Option<(&Chunk, usize)> = None;
    for chunk in retrieval.chunks() {
        let score = lexical_overlap(&question_terms, &chunk.text);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((chunk, score));
        }
    }

    let (chunk, score) = best?;
    if score < min_overlap {
        return None;
    }

    let extract: Vec<String> = split_sentences(&chunk.text)
        .into_iter()
        .filter(|sentence| lexical_overlap(&question_terms, sentence) > 0)
        .take(MAX_EXTRACT_SENTENCES)
        .collect();

    if extract.is_empty() {
        None
    } else {
        Some(extract.join(" "))
    }
}
