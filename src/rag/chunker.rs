//! Hierarchical text splitter.
//!
//! Windows of at most `chunk_size` characters are cut at the strongest
//! boundary found in the back half of the window:
//! paragraph, line, sentence, whitespace, then a hard cut.
//! Each following window starts `chunk_overlap` characters before the
//! previous cut, so adjacent chunks share exactly that many characters.

use serde::{Deserialize, Serialize};

use super::types::{Chunk, ChunkMetadata};
use crate::core::errors::RagError;

const PARAGRAPH_BREAKS: [&str; 1] = ["\n\n"];
const LINE_BREAKS: [&str; 1] = ["\n"];
const SENTENCE_ENDINGS: [&str; 3] = [". ", "! ", "? "];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
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
        Ok(())
    }
}

pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into overlapping chunks. Blank input yields no chunks.
    pub fn chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let window_end = (start + chunk_size).min(total_chars);
            let end = if window_end == total_chars {
                total_chars
            } else {
                let min_end = start + (chunk_size / 2).max(overlap + 1);
                find_break(&chars, min_end, window_end)
            };

            let chunk_text: String = chars[start..end].iter().collect();
            chunks.push(Chunk::new(chunk_text, metadata, chunks.len(), start, end));

            if end == total_chars {
                break;
            }
            start = end - overlap;
        }

        chunks
    }
}

/// Convenience form of [`TextChunker::chunk`] that validates the sizes first.
pub fn chunk_text(
    text: &str,
    metadata: &ChunkMetadata,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, RagError> {
    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size,
        chunk_overlap,
    })?;
    Ok(chunker.chunk(text, metadata))
}

/// Latest cut position in `min_end..=window_end`, by boundary strength.
fn find_break(chars: &[char], min_end: usize, window_end: usize) -> usize {
    for separators in [&PARAGRAPH_BREAKS[..], &LINE_BREAKS[..], &SENTENCE_ENDINGS[..]] {
        if let Some(pos) = last_separator_end(chars, min_end, window_end, separators) {
            return pos;
        }
    }

    (min_end..=window_end)
        .rev()
        .find(|&pos| chars[pos - 1].is_whitespace())
        .unwrap_or(window_end)
}

fn last_separator_end(
    chars: &[char],
    min_end: usize,
    window_end: usize,
    separators: &[&str],
) -> Option<usize> {
    (min_end..=window_end).rev().find(|&pos| {
        separators.iter().any(|sep| {
            let len = sep.chars().count();
            pos >= len && chars[pos - len..pos].iter().copied().eq(sep.chars())
        })
    })
}
