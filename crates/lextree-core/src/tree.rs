//! Markdown-to-tree ingestion.
//!
//! Segments heading-structured text into top-level sections (`# ` headings)
//! and sub-sections (`## ` headings), extracting page provenance from inline
//! `[[PAGE n]]` markers.
//!
//! # Algorithm
//!
//! 1. Trim every line; collect lines matching `^#{1,6}\s+` as headings.
//!    Only depths 1 and 2 are structural; deeper headings stay body text.
//! 2. Each depth-1 heading opens a block that runs to the next depth-1
//!    heading or the end of input. Text before the first depth-1 heading
//!    is discarded; no depth-1 heading at all gives an empty tree.
//! 3. Depth-2 headings strictly inside a block split it into sub-blocks
//!    the same way. Leading text before the first depth-2 heading belongs
//!    to the block (and its summary) but not to any sub-section.
//! 4. A block's pages are its `[[PAGE n]]` numbers, sorted and deduplicated.
//! 5. A sub-block without markers inherits the pages last seen among its
//!    preceding siblings. The first sub-block inherits the leading text's
//!    pages, or the whole block's pages when the leading text has none.
//! 6. A block with no depth-2 heading gets one synthetic sub-section
//!    carrying the block's heading, text and pages.
//! 7. Ids: `<top_prefix>_NN` in encounter order and
//!    `<sub_prefix>_NN_MM` numbered per parent, zero-padded to two digits.
//! 8. Each top-level summary comes from the configured summarizer applied
//!    to the full block text.
//!
//! # Example
//!
//! ```rust
//! use lextree_core::tree::{build_tree, IngestionConfig};
//!
//! let md = "# Title\n[[PAGE 1]]\n## Section A\nA text.\n## Section B\nB text.\n";
//! let tree = build_tree(md, &IngestionConfig::new("doc_02", "doc.pdf")).unwrap();
//! assert_eq!(tree.top_sections().len(), 1);
//! assert_eq!(tree.sub_sections().len(), 2);
//! assert_eq!(tree.sub_section("h2_01_02").unwrap().pages, vec![1]);
//! ```

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::models::{DocumentRoot, DocumentTree, SubSection, TopSection, TreeError};
use crate::summarize::{Summarizer, TruncatingSummarizer};
use crate::text::dedupe_preserve_order;

static PAGE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\[PAGE\s+(\d+)\]\]").expect("page marker pattern is valid")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("heading pattern is valid"));

/// Default prefix for top-level section ids.
pub const DEFAULT_TOP_PREFIX: &str = "h1";
/// Default prefix for sub-section ids.
pub const DEFAULT_SUB_PREFIX: &str = "h2";

/// Per-document ingestion settings.
#[derive(Clone)]
pub struct IngestionConfig {
    pub doc_id: String,
    pub pdf_name: String,
    pub top_prefix: String,
    pub sub_prefix: String,
    /// `None` uses [`TruncatingSummarizer::default`].
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl IngestionConfig {
    pub fn new(doc_id: impl Into<String>, pdf_name: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            pdf_name: pdf_name.into(),
            top_prefix: DEFAULT_TOP_PREFIX.to_string(),
            sub_prefix: DEFAULT_SUB_PREFIX.to_string(),
            summarizer: None,
        }
    }

    pub fn with_prefixes(mut self, top: impl Into<String>, sub: impl Into<String>) -> Self {
        self.top_prefix = top.into();
        self.sub_prefix = sub.into();
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn root(&self) -> DocumentRoot {
        DocumentRoot::new(self.doc_id.clone(), self.pdf_name.clone())
    }
}

impl fmt::Debug for IngestionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionConfig")
            .field("doc_id", &self.doc_id)
            .field("pdf_name", &self.pdf_name)
            .field("top_prefix", &self.top_prefix)
            .field("sub_prefix", &self.sub_prefix)
            .field("custom_summarizer", &self.summarizer.is_some())
            .finish()
    }
}

struct Heading<'a> {
    line: usize,
    level: usize,
    head: &'a str,
}

/// Build a [`DocumentTree`] from heading-structured text.
///
/// # Errors
///
/// Only [`TreeError`] contract violations, e.g. prefixes chosen so that a
/// top-level id collides with a sub-section id. Malformed input never
/// errors; text without a depth-1 heading yields an empty tree.
pub fn build_tree(markdown: &str, config: &IngestionConfig) -> Result<DocumentTree, TreeError> {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();
    let headings = find_headings(&lines);

    let default_summarizer = TruncatingSummarizer::default();
    let summarizer: &dyn Summarizer = match &config.summarizer {
        Some(s) => s.as_ref(),
        None => &default_summarizer,
    };

    let tops: Vec<&Heading> = headings.iter().filter(|h| h.level == 1).collect();

    let mut top_nodes = Vec::with_capacity(tops.len());
    let mut sub_nodes = Vec::new();

    for (top_idx, top) in tops.iter().enumerate() {
        let top_counter = top_idx + 1;
        let top_id = format!("{}_{:02}", config.top_prefix, top_counter);
        let block_end = tops
            .get(top_idx + 1)
            .map(|next| next.line)
            .unwrap_or(lines.len());

        let block_text = join_block(&lines[top.line + 1..block_end]);
        let block_pages = extract_pages(&block_text);

        let subs: Vec<&Heading> = headings
            .iter()
            .filter(|h| h.level == 2 && h.line > top.line && h.line < block_end)
            .collect();

        let mut children = Vec::with_capacity(subs.len().max(1));

        if subs.is_empty() {
            let sub_id = format!("{}_{:02}_{:02}", config.sub_prefix, top_counter, 1);
            sub_nodes.push(SubSection {
                node_id: sub_id.clone(),
                parent: top_id.clone(),
                head: top.head.to_string(),
                text: block_text.clone(),
                pages: block_pages.clone(),
                pdf_name: config.pdf_name.clone(),
                embedding: None,
            });
            children.push(sub_id);
        } else {
            let leading_pages = extract_pages(&join_block(&lines[top.line + 1..subs[0].line]));
            let mut last_pages = if leading_pages.is_empty() {
                block_pages.clone()
            } else {
                leading_pages
            };

            for (sub_idx, sub) in subs.iter().enumerate() {
                let sub_end = subs
                    .get(sub_idx + 1)
                    .map(|next| next.line)
                    .unwrap_or(block_end);
                let text = join_block(&lines[sub.line + 1..sub_end]);
                let own_pages = extract_pages(&text);
                let pages = if own_pages.is_empty() {
                    last_pages.clone()
                } else {
                    last_pages = own_pages.clone();
                    own_pages
                };

                let sub_id = format!(
                    "{}_{:02}_{:02}",
                    config.sub_prefix,
                    top_counter,
                    sub_idx + 1
                );
                sub_nodes.push(SubSection {
                    node_id: sub_id.clone(),
                    parent: top_id.clone(),
                    head: sub.head.to_string(),
                    text,
                    pages,
                    pdf_name: config.pdf_name.clone(),
                    embedding: None,
                });
                children.push(sub_id);
            }
        }

        let summary = summarizer.summarize(&block_text);
        top_nodes.push(TopSection {
            node_id: top_id,
            head: top.head.to_string(),
            summary,
            pages: block_pages,
            pdf_name: config.pdf_name.clone(),
            children,
        });
    }

    let tree = DocumentTree::from_nodes(top_nodes, sub_nodes)?;
    debug!(
        doc_id = %config.doc_id,
        top_sections = tree.top_sections().len(),
        sub_sections = tree.sub_sections().len(),
        "built document tree"
    );
    Ok(tree)
}

/// Page numbers referenced by `[[PAGE n]]` markers, sorted and deduplicated.
///
/// Markers are matched case-insensitively. Numbers that do not fit a `u32`
/// are skipped.
pub fn extract_pages(text: &str) -> Vec<u32> {
    let mut pages: Vec<u32> = PAGE_MARKER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}

/// Order-preserving union of the pages of the given sections.
pub fn combine_pages(top_sections: &[&TopSection], sub_sections: &[&SubSection]) -> Vec<u32> {
    let pages = top_sections
        .iter()
        .flat_map(|n| n.pages.iter().copied())
        .chain(sub_sections.iter().flat_map(|n| n.pages.iter().copied()));
    dedupe_preserve_order(pages)
}

fn find_headings<'a>(lines: &[&'a str]) -> Vec<Heading<'a>> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line, text)| {
            let caps = HEADING_RE.captures(text)?;
            let level = caps.get(1)?.as_str().len();
            let head = caps.get(2)?.as_str().trim();
            Some(Heading { line, level, head })
        })
        .collect()
}

fn join_block(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}
