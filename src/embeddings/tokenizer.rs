// tokenizer.rs — Whole-word tokenizer with CLS/SEP framing.
//
// No subword splitting: a word missing from the vocabulary becomes a single UNK token,
// however long it is. This is a known fidelity cost versus the model's WordPiece
// training tokenizer.

use crate::config::special_tokens::{CLS, FRAMING_SLOTS, SEP, UNK};

use super::vocab::Vocabulary;

/// Token ids for one input text, always framed as `[CLS, body.., SEP]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    ids: Vec<u32>,
}

impl TokenSequence {
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Never true for sequences built by [`tokenize`], which always carry the CLS/SEP frame.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of non-framing tokens.
    pub fn body_len(&self) -> usize {
        self.ids.len().saturating_sub(FRAMING_SLOTS)
    }
}

/// Word separators: ASCII space, tab, newline, vertical tab, form feed, carriage return.
/// Other Unicode spaces (U+00A0, U+3000, ..) stay inside the word.
fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// Tokenize `text` into at most `max_length` ids.
///
/// Lowercases, splits on separator runs, keeps the first `max_length - 2` words and maps
/// each through `vocab` (UNK when absent). A `max_length` of 2 or less yields `[CLS, SEP]`.
pub fn tokenize(vocab: &Vocabulary, text: &str, max_length: usize) -> TokenSequence {
    let max_words = max_length.saturating_sub(FRAMING_SLOTS);
    let lower = text.to_lowercase();

    let mut ids = Vec::with_capacity(FRAMING_SLOTS + max_words.min(lower.len()));
    ids.push(CLS);
    ids.extend(
        lower
            .split(is_separator)
            .filter(|word| !word.is_empty())
            .take(max_words)
            .map(|word| vocab.get(word).unwrap_or(UNK)),
    );
    ids.push(SEP);

    TokenSequence { ids }
}
