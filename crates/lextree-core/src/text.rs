//! Text utilities shared by the indexes and the tree builder.
//!
//! - [`tokenize`]: lowercase alphanumeric tokens (an internal apostrophe is
//!   kept, so `"party's"` is one token).
//! - [`dedupe_preserve_order`]: drop repeats, keep first occurrence.
//! - [`summarize_text`]: the built-in extractive summary (leading
//!   sentences, truncated with an ellipsis).
//! - [`word_count`]: whitespace-separated words in a raw query.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9]+(?:'[A-Za-z0-9]+)?").expect("token pattern is valid")
});

/// Ellipsis appended by [`summarize_text`] when it truncates.
pub const ELLIPSIS: char = '…';

/// Split text into lowercase tokens.
///
/// ```rust
/// use lextree_core::text::tokenize;
///
/// assert_eq!(tokenize("The Tenant's DUTY, s.12"), vec!["the", "tenant's", "duty", "s", "12"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Number of whitespace-separated words, punctuation included.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Remove duplicates while keeping the first-seen order.
pub fn dedupe_preserve_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            ordered.push(item);
        }
    }
    ordered
}

/// Extractive summary: the first `max_sentences` sentences, capped at
/// `max_chars` characters.
///
/// Sentences end at `.`, `!` or `?` followed by whitespace. When the joined
/// sentences exceed `max_chars`, the result is cut to `max_chars - 1`
/// characters, right-trimmed, and terminated with [`ELLIPSIS`].
pub fn summarize_text(text: &str, max_sentences: usize, max_chars: usize) -> String {
    let sentences = split_sentences(text.trim());
    let summary = sentences
        .into_iter()
        .take(max_sentences)
        .collect::<Vec<_>>()
        .join(" ");
    let summary = summary.trim();

    if summary.chars().count() > max_chars {
        let cut: String = summary.chars().take(max_chars.saturating_sub(1)).collect();
        let mut truncated = cut.trim_end().to_string();
        truncated.push(ELLIPSIS);
        truncated
    } else {
        summary.to_string()
    }
}

/// Split on whitespace runs that follow sentence-ending punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let mut next_start = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            next_start = j + w.len_utf8();
            chars.next();
        }
        if next_start > end {
            sentences.push(&text[start..end]);
            start = next_start;
        }
    }

    if start < text.len() || sentences.is_empty() {
        sentences.push(&text[start..]);
    }
    sentences
}
