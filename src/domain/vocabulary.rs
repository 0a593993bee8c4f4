// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional token ↔ index mapping. Index 0 is always the
// padding token and index 1 the unknown token; the masking code
// relies on PAD_ID being 0-padding on the right of every row.
//
// The vocabulary is built once (prepare-vocab) and immutable for
// the rest of a run.

use std::collections::HashMap;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    token_to_index: HashMap<String, u32>,
    index_to_token: Vec<String>,
}

impl Vocabulary {
    /// Build from an ordered token list; the reserved tokens are
    /// prepended and duplicates ignored.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self {
            token_to_index: HashMap::new(),
            index_to_token: Vec::new(),
        };
        vocab.push(PAD_TOKEN.to_string());
        vocab.push(UNK_TOKEN.to_string());
        for token in tokens {
            vocab.push(token.into());
        }
        vocab
    }

    /// Keep tokens seen at least `min_freq` times, most frequent first,
    /// at most `max_size` of them (reserved tokens not included).
    /// Ties are broken alphabetically so the result is deterministic.
    pub fn from_counts(counts: &HashMap<String, usize>, min_freq: usize, max_size: Option<usize>) -> Self {
        let mut kept: Vec<(&String, usize)> = counts
            .iter()
            .filter(|(_, &n)| n >= min_freq)
            .map(|(token, &n)| (token, n))
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if let Some(max) = max_size {
            kept.truncate(max);
        }
        Self::from_tokens(kept.into_iter().map(|(token, _)| token.clone()))
    }

    /// Rebuild from a token → index map, e.g. the model section of a tokenizer file.
    pub fn from_index_map(map: HashMap<String, u32>) -> Self {
        let mut index_to_token = vec![String::new(); map.len()];
        for (token, &index) in &map {
            if let Some(slot) = index_to_token.get_mut(index as usize) {
                *slot = token.clone();
            }
        }
        Self { token_to_index: map, index_to_token }
    }

    fn push(&mut self, token: String) {
        if self.token_to_index.contains_key(&token) {
            return;
        }
        self.token_to_index.insert(token.clone(), self.index_to_token.len() as u32);
        self.index_to_token.push(token);
    }

    /// Index of `token`, or UNK_ID when absent.
    pub fn index(&self, token: &str) -> u32 {
        self.token_to_index.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn len(&self) -> usize {
        self.index_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_token.is_empty()
    }

    pub fn token_to_index(&self) -> &HashMap<String, u32> {
        &self.token_to_index
    }
}
