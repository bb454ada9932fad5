//! Summarizer capability used by the tree builder.
//!
//! A summarizer turns the full text of a top-level block into the short
//! summary stored on the [`TopSection`](crate::models::TopSection) and
//! indexed by BM25. The contract is infallible: implementations that call
//! out to a remote service must degrade to [`TruncatingSummarizer`] output
//! instead of returning an error.
//!
//! Any `Fn(&str) -> String + Send + Sync` closure is a summarizer, which
//! keeps tests and ad-hoc callers free of boilerplate.

use crate::text::summarize_text;

/// Default number of leading sentences kept by [`TruncatingSummarizer`].
pub const DEFAULT_MAX_SENTENCES: usize = 2;
/// Default character cap for [`TruncatingSummarizer`].
pub const DEFAULT_MAX_CHARS: usize = 240;

/// Produces a summary for a block of text.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> String;
}

impl<F> Summarizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn summarize(&self, text: &str) -> String {
        self(text)
    }
}

/// Built-in extractive summarizer: leading sentences, ellipsis-truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatingSummarizer {
    pub max_sentences: usize,
    pub max_chars: usize,
}

impl TruncatingSummarizer {
    pub fn new(max_sentences: usize, max_chars: usize) -> Self {
        Self {
            max_sentences,
            max_chars,
        }
    }
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENTENCES, DEFAULT_MAX_CHARS)
    }
}

impl Summarizer for TruncatingSummarizer {
    fn summarize(&self, text: &str) -> String {
        summarize_text(text, self.max_sentences, self.max_chars)
    }
}
