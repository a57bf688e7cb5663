// vocab.rs — Word → token id mapping loaded from a line-oriented vocab.txt.
//
// Line index (0-based) is the token id, line content is the token string.
// Duplicate lines: the LAST occurrence wins, matching append-only vocab formats.

use std::collections::HashMap;

/// Immutable vocabulary shared read-only by every tokenizer call.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    /// Parse vocab.txt content (one token per line, `\n` or `\r\n` separated).
    pub fn from_text(text: &str) -> Self {
        // `collect` into a HashMap keeps the last value for a repeated key.
        let ids = text
            .lines()
            .enumerate()
            .map(|(i, token)| (token.to_string(), i as u32))
            .collect();
        Self { ids }
    }

    /// Build from explicit (word, id) pairs. Later pairs override earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            ids: pairs.into_iter().map(|(w, id)| (w.into(), id)).collect(),
        }
    }

    pub fn get(&self, word: &str) -> Option<u32> {
        self.ids.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
