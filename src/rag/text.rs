//! Term and sentence helpers shared by the local embedder and the
//! lexical fallback.

use std::collections::BTreeSet;

const STOP_WORDS: [&str; 48] = [
    "the", "and", "are", "was", "were", "for", "with", "that", "this", "these", "those", "what",
    "which", "who", "whom", "whose", "when", "where", "why", "how", "does", "did", "can", "could",
    "would", "should", "will", "shall", "has", "have", "had", "not", "but", "from", "into", "about",
    "its", "also", "you", "your", "our", "their", "there", "they", "tell", "define", "explain",
    "any",
];

/// Lower-cased alphanumeric runs; everything else separates terms.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| term.to_lowercase())
        .collect()
}

/// Distinct terms longer than two characters that are not stop words.
pub fn significant_terms(text: &str) -> BTreeSet<String> {
    terms(text)
        .into_iter()
        .filter(|term| term.chars().count() > 2 && !STOP_WORDS.contains(&term.as_str()))
        .collect()
}

/// Sentences in source order, each trimmed and keeping its terminator.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_terminator = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_terminator || c == '\n' {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
