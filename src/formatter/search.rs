//! Token index over formatted response text.
//!
//! A token is a maximal run of alphanumeric characters or `_`. Tokens are stored
//! lower-cased, each with the ascending byte offsets where it starts.

use std::collections::BTreeMap;

/// Searchable index of the tokens in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    tokens: BTreeMap<String, Vec<usize>>,
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lower-cases one character at a time, the way [`match_len`] compares.
///
/// `str::to_lowercase` is context sensitive (a word-final `Σ` becomes `ς`),
/// which would hide tokens from queries the scan itself would match.
fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

impl SearchIndex {
    /// Tokenizes `text` and records the start offset of every token.
    pub fn build(text: &str) -> Self {
        let mut tokens: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut start: Option<usize> = None;

        for (i, c) in text.char_indices() {
            match (is_token_char(c), start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    tokens.entry(fold(&text[s..i])).or_default().push(s);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.entry(fold(&text[s..])).or_default().push(s);
        }

        Self { tokens }
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Offsets of the whole token `token`, matched case-insensitively.
    pub fn find_token(&self, token: &str) -> &[usize] {
        self.tokens
            .get(&fold(token))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Start offsets of every non-overlapping occurrence of `query` in `text`.
    ///
    /// `text` must be the text this index was built from. Matches inside larger
    /// tokens are included. Case-insensitive queries made only of token
    /// characters never cross a token boundary, so only tokens containing the
    /// query are scanned; every other query scans the whole text.
    pub fn find(&self, text: &str, query: &str, case_sensitive: bool) -> Vec<usize> {
        if query.is_empty() {
            return Vec::new();
        }

        if case_sensitive {
            return text.match_indices(query).map(|(i, _)| i).collect();
        }

        if !query.chars().all(is_token_char) {
            return scan(text, 0, query);
        }

        let needle = fold(query);
        let mut offsets: Vec<usize> = self
            .tokens
            .iter()
            .filter(|(token, _)| token.contains(&needle))
            .flat_map(|(_, starts)| starts.iter())
            .flat_map(|&start| {
                let len = text[start..]
                    .find(|c: char| !is_token_char(c))
                    .unwrap_or(text.len() - start);
                scan(&text[..start + len], start, query)
            })
            .collect();

        offsets.sort_unstable();
        offsets
    }
}

/// Case-insensitive, non-overlapping scan of `text[from..]`.
fn scan(text: &str, from: usize, query: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut i = from;

    while i < text.len() {
        match match_len(&text[i..], query) {
            Some(len) => {
                offsets.push(i);
                i += len;
            }
            None => {
                i += text[i..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    offsets
}

/// Byte length of the prefix of `hay` equal to `query` ignoring case.
fn match_len(hay: &str, query: &str) -> Option<usize> {
    let mut hay_chars = hay.char_indices();
    for q in query.chars() {
        let (_, h) = hay_chars.next()?;
        if !h.to_lowercase().eq(q.to_lowercase()) {
            return None;
        }
    }
    Some(hay_chars.next().map_or(hay.len(), |(i, _)| i))
}
