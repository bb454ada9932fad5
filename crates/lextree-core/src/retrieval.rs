//! Two-stage retrieval over one document tree.
//!
//! ```text
//! query ──► BM25 over top sections (top_h1) ──► candidates
//!                                                  │
//!                    words > threshold? ───────────┤
//!                     yes │                        │ no
//!                         ▼                        ▼
//!       vector search scoped to the          one chunk per candidate:
//!       candidates' children (top_h2)        head + summary, score 0.0
//!                         │                        │
//!                         └──────────► citations ◄─┘
//! ```
//!
//! Scores from the two paths are not comparable: detail chunks carry a
//! cosine similarity, overview chunks carry `0.0`.
//!
//! The agent holds borrowed views of a tree and its indexes and keeps no
//! state between calls. Stale ids (a candidate or child missing from the
//! tree) are skipped.

use serde::Serialize;
use tracing::debug;

use crate::lexical::Bm25Index;
use crate::models::{DocumentTree, SubSection};
use crate::similarity::VectorIndex;
use crate::text::{dedupe_preserve_order, word_count};

/// Default number of BM25 candidates.
pub const DEFAULT_TOP_H1: usize = 3;
/// Default number of vector results in the detail path.
pub const DEFAULT_TOP_H2: usize = 4;
/// Queries with more words than this take the detail path.
pub const DEFAULT_DETAIL_WORD_THRESHOLD: usize = 3;

/// Which path a query takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRoute {
    Overview,
    Detail,
}

impl QueryRoute {
    /// Classify by whitespace-separated word count. This is a length
    /// heuristic, not a semantic judgement.
    pub fn classify(query: &str, threshold: usize) -> Self {
        if word_count(query) > threshold {
            QueryRoute::Detail
        } else {
            QueryRoute::Overview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryRoute::Overview => "overview",
            QueryRoute::Detail => "detail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub top_h1: usize,
    pub top_h2: usize,
    pub detail_word_threshold: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_h1: DEFAULT_TOP_H1,
            top_h2: DEFAULT_TOP_H2,
            detail_word_threshold: DEFAULT_DETAIL_WORD_THRESHOLD,
        }
    }
}

/// One unit of retrieved context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub node_id: String,
    pub text: String,
    pub pdf_name: String,
    pub pages: Vec<u32>,
    pub parent_h1: String,
    pub score: f64,
}

impl RetrievedChunk {
    fn from_sub_section(node: &SubSection, score: f32) -> Self {
        Self {
            node_id: node.node_id.clone(),
            text: node.text.clone(),
            pdf_name: node.pdf_name.clone(),
            pages: node.pages.clone(),
            parent_h1: node.parent.clone(),
            score: f64::from(score),
        }
    }

    /// `"<pdf_name> p.<pages> [<node_id>]"`, with `n/a` for no pages.
    pub fn citation(&self) -> String {
        let pages = if self.pages.is_empty() {
            "n/a".to_string()
        } else {
            self.pages
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} p.{} [{}]", self.pdf_name, pages, self.node_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub route: QueryRoute,
    pub h1_candidates: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
    pub citations: Vec<String>,
}

/// Stateless orchestrator over a tree and its two indexes.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalAgent<'a> {
    tree: &'a DocumentTree,
    bm25: &'a Bm25Index,
    vector: &'a VectorIndex,
}

impl<'a> RetrievalAgent<'a> {
    pub fn new(tree: &'a DocumentTree, bm25: &'a Bm25Index, vector: &'a VectorIndex) -> Self {
        Self { tree, bm25, vector }
    }

    /// Ranked top-level section ids.
    pub fn bm25_search(&self, query: &str, top_k: usize) -> Vec<String> {
        self.bm25
            .search(query, top_k)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Vector search restricted to the children of `h1_scope`.
    pub fn vector_search(
        &self,
        query: &str,
        h1_scope: &[String],
        top_k: usize,
    ) -> Vec<(SubSection, f32)> {
        let children = h1_scope
            .iter()
            .filter_map(|id| self.tree.top_section(id))
            .flat_map(|top| top.children.iter().cloned());
        let scope = dedupe_preserve_order(children);
        self.vector.search(query, &scope, top_k)
    }

    /// See [`tree_expand`].
    pub fn tree_expand(&self, node_id: &str, window: usize) -> Vec<String> {
        tree_expand(self.tree, node_id, window)
    }

    /// Citation per chunk, deduplicated in first-seen order.
    pub fn format_citations(&self, chunks: &[RetrievedChunk]) -> Vec<String> {
        dedupe_preserve_order(chunks.iter().map(RetrievedChunk::citation))
    }

    pub fn retrieve(&self, query: &str, params: &RetrievalParams) -> RetrievalResult {
        let h1_candidates = self.bm25_search(query, params.top_h1);
        let route = QueryRoute::classify(query, params.detail_word_threshold);
        debug!(
            route = route.as_str(),
            candidates = h1_candidates.len(),
            "routed query"
        );

        let chunks: Vec<RetrievedChunk> = match route {
            QueryRoute::Detail => self
                .vector_search(query, &h1_candidates, params.top_h2)
                .iter()
                .map(|(node, score)| RetrievedChunk::from_sub_section(node, *score))
                .collect(),
            QueryRoute::Overview => h1_candidates
                .iter()
                .filter_map(|id| self.tree.top_section(id))
                .map(|top| RetrievedChunk {
                    node_id: top.node_id.clone(),
                    text: format!("{}\n{}", top.head, top.summary),
                    pdf_name: top.pdf_name.clone(),
                    pages: top.pages.clone(),
                    parent_h1: top.node_id.clone(),
                    score: 0.0,
                })
                .collect(),
        };

        let citations = self.format_citations(&chunks);
        RetrievalResult {
            query: query.to_string(),
            route,
            h1_candidates,
            chunks,
            citations,
        }
    }
}

/// Sibling ids within `window` positions of `node_id`, including itself.
///
/// Every top-level section listing `node_id` contributes. An unknown id
/// yields an empty list.
pub fn tree_expand(tree: &DocumentTree, node_id: &str, window: usize) -> Vec<String> {
    let neighbors = tree.top_sections_in_order().into_iter().flat_map(|top| {
        let children = &top.children;
        let range = children
            .iter()
            .position(|c| c == node_id)
            .map(|idx| {
                let start = idx.saturating_sub(window);
                let end = idx.saturating_add(window).saturating_add(1).min(children.len());
                start..end
            })
            .unwrap_or(0..0);
        children[range].iter().cloned()
    });
    dedupe_preserve_order(neighbors)
}
