//! BM25 index over top-level sections.
//!
//! One entry per [`TopSection`]; the indexed text is the section's head,
//! summary and source name joined by newlines. The index keeps running
//! statistics (document frequency per term, token length per entry, and
//! the corpus-wide average length) and recomputes per-entry term counts at
//! query time. Search is a linear scan over entries.
//!
//! # Scoring
//!
//! ```text
//! idf(t)   = ln(1 + (N - df(t) + 0.5) / (df(t) + 0.5))
//! score(d) = Σ_t∈q∩d  idf(t) · tf·(k1+1) / (tf + k1·(1 - b + b·len(d)/avgLen))
//! ```
//!
//! Results are sorted by descending score with a stable sort, so ties keep
//! insertion order. Query terms absent from an entry contribute nothing.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::TopSection;
use crate::text::tokenize;

/// Default term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.5;
/// Default length normalization.
pub const DEFAULT_B: f64 = 0.75;

#[derive(Debug, Clone)]
struct Bm25Entry {
    node_id: String,
    text: String,
    len: usize,
}

/// Lexical ranking index.
///
/// `add` takes `&mut self` and `search` takes `&self`, so the borrow
/// checker enforces the single-writer rule for a given instance; see
/// [`SharedIndexes`](crate::index::SharedIndexes) for cross-thread use.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    entries: Vec<Bm25Entry>,
    positions: HashMap<String, usize>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

impl Bm25Index {
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            entries: Vec::new(),
            positions: HashMap::new(),
            doc_freqs: HashMap::new(),
            avg_doc_len: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    /// Number of entries containing `term` (already lowercase).
    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    /// Index a top-level section.
    ///
    /// Re-adding an id replaces the previous entry in place: its term
    /// statistics are withdrawn first and its insertion position is kept.
    pub fn add(&mut self, node: &TopSection) {
        let text = format!("{}\n{}\n{}", node.head, node.summary, node.pdf_name);
        let tokens = tokenize(&text);
        let entry = Bm25Entry {
            node_id: node.node_id.clone(),
            text,
            len: tokens.len(),
        };

        match self.positions.get(&node.node_id).copied() {
            Some(pos) => {
                let old_terms: HashSet<String> =
                    tokenize(&self.entries[pos].text).into_iter().collect();
                for term in old_terms {
                    if let Some(df) = self.doc_freqs.get_mut(&term) {
                        *df -= 1;
                        if *df == 0 {
                            self.doc_freqs.remove(&term);
                        }
                    }
                }
                self.entries[pos] = entry;
            }
            None => {
                self.positions
                    .insert(node.node_id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }

        let distinct: HashSet<String> = tokens.into_iter().collect();
        for term in distinct {
            *self.doc_freqs.entry(term).or_insert(0) += 1;
        }

        let total: usize = self.entries.iter().map(|e| e.len).sum();
        self.avg_doc_len = total as f64 / self.entries.len().max(1) as f64;
    }

    /// Rank entries against `query`, returning up to `top_k` `(node_id, score)`
    /// pairs.
    ///
    /// An empty corpus or a query without tokens returns an empty list. A
    /// query whose tokens appear nowhere returns entries scored `0.0` in
    /// insertion order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.entries.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let total_docs = self.entries.len() as f64;
        let avg_len = self.avg_doc_len.max(1.0);

        let mut scores: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|entry| {
                let mut term_counts: HashMap<String, usize> = HashMap::new();
                for token in tokenize(&entry.text) {
                    *term_counts.entry(token).or_insert(0) += 1;
                }
                let doc_len = entry.len as f64;

                let score: f64 = query_tokens
                    .iter()
                    .filter_map(|token| {
                        let tf = *term_counts.get(token)? as f64;
                        let df = self.doc_freq(token) as f64;
                        let idf = (1.0 + (total_docs - df + 0.5) / (df + 0.5)).ln();
                        let denom =
                            tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len);
                        Some(idf * (tf * (self.k1 + 1.0) / denom))
                    })
                    .sum();

                (entry.node_id.clone(), score)
            })
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores.truncate(top_k);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, head: &str, summary: &str) -> TopSection {
        TopSection {
            node_id: id.to_string(),
            head: head.to_string(),
            summary: summary.to_string(),
            pages: vec![],
            pdf_name: "act.pdf".to_string(),
            children: vec![],
        }
    }

    fn corpus() -> Bm25Index {
        let mut index = Bm25Index::default();
        index.add(&section("h1_01", "Definitions", "Terms used in this Act."));
        index.add(&section(
            "h1_02",
            "Penalties",
            "A penalty applies for late filing. The penalty is a fine.",
        ));
        index.add(&section("h1_03", "Filing", "Returns must be filed annually."));
        index
    }

    #[test]
    fn test_empty_corpus_returns_empty() {
        let index = Bm25Index::default();
        assert!(index.search("penalty", 5).is_empty());
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let index = corpus();
        assert!(index.search("", 5).is_empty());
        assert!(index.search("  ?? ", 5).is_empty());
    }

    #[test]
    fn test_ranks_matching_section_first() {
        let index = corpus();
        let results = index.search("penalty", 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "h1_02");
        assert!(results[0].1 > 0.0);
        assert_eq!(results[1].1, 0.0);
    }

    #[test]
    fn test_unknown_terms_score_zero_in_insertion_order() {
        let index = corpus();
        let results = index.search("zebra quokka", 10);
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["h1_01", "h1_02", "h1_03"]);
        assert!(results.iter().all(|(_, s)| *s == 0.0));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = Bm25Index::default();
        index.add(&section("b", "Scope", "x"));
        index.add(&section("a", "Scope", "x"));
        let results = index.search("scope", 2);
        assert_eq!(results[0].0, "b");
        assert_eq!(results[1].0, "a");
        assert_eq!(results[0].1, results[1].1);
    }

    #[test]
    fn test_top_k_truncates() {
        let index = corpus();
        assert_eq!(index.search("act", 1).len(), 1);
        assert!(index.search("act", 0).is_empty());
    }

    #[test]
    fn test_statistics() {
        let index = corpus();
        assert_eq!(index.len(), 3);
        // pdf name tokens are in every entry
        assert_eq!(index.doc_freq("pdf"), 3);
        assert_eq!(index.doc_freq("penalty"), 1);
        assert!(index.avg_doc_len() > 0.0);
    }

    #[test]
    fn test_score_matches_formula() {
        let mut index = Bm25Index::new(1.2, 0.5);
        index.add(&section("h1_01", "fine", ""));
        index.add(&section("h1_02", "other", ""));
        // entry text: "fine\n\nact.pdf" -> [fine, act, pdf], len 3, avg 3
        let results = index.search("fine", 1);
        let idf = (1.0f64 + (2.0 - 1.0 + 0.5) / (1.0 + 0.5)).ln();
        let expected = idf * (1.0 * 2.2) / (1.0 + 1.2 * (1.0 - 0.5 + 0.5 * 1.0));
        assert!((results[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn test_re_add_replaces_entry() {
        let mut index = corpus();
        index.add(&section("h1_01", "Repealed", "Nothing remains."));
        assert_eq!(index.len(), 3);
        assert_eq!(index.doc_freq("definitions"), 0);
        assert_eq!(index.doc_freq("pdf"), 3);
        let results = index.search("zebra", 3);
        assert_eq!(results[0].0, "h1_01");
        assert_eq!(index.search("repealed", 1)[0].0, "h1_01");
    }
}
