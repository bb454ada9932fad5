//! Scoped vector index over sub-sections.
//!
//! Every search is restricted to a caller-supplied scope of sub-section
//! ids; entries outside the scope are never scored. The index stores a
//! copy of each node together with its embedding, computing the embedding
//! with the configured [`Embedder`] when the node does not carry one.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::embedding::{cosine_similarity, Embedder, HashEmbedder, DEFAULT_EMBEDDING_DIM};
use crate::models::SubSection;

/// Cosine-similarity index over [`SubSection`]s.
#[derive(Clone)]
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: HashMap<String, SubSection>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model", &self.embedder.model_name())
            .field("dims", &self.embedder.dims())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl VectorIndex {
    /// Index backed by a [`HashEmbedder`] of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self::with_embedder(Arc::new(HashEmbedder::new(dim)))
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: HashMap::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.embedder.dims()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, node_id: &str) -> Option<&SubSection> {
        self.entries.get(node_id)
    }

    /// Index a sub-section and return the embedding it was stored with.
    ///
    /// A node that already carries an embedding of this index's dimension
    /// keeps it. A missing embedding, or one of another dimension, is
    /// computed from the node's text.
    pub fn add(&mut self, node: &SubSection) -> &[f32] {
        let mut stored = node.clone();
        let dims = self.embedder.dims();
        if stored.embedding.as_ref().map_or(true, |e| e.len() != dims) {
            stored.embedding = Some(self.embedder.embed(&node.text));
        }
        let id = node.node_id.clone();
        self.entries.insert(id.clone(), stored);
        self.entries
            .get(&id)
            .and_then(|n| n.embedding.as_deref())
            .unwrap_or(&[])
    }

    /// Rank the sub-sections named in `scope` against `query`.
    ///
    /// Ids in `scope` that are not indexed are skipped, repeated ids are
    /// scored once, and ties keep scope order. An empty scope returns an
    /// empty list.
    pub fn search(&self, query: &str, scope: &[String], top_k: usize) -> Vec<(SubSection, f32)> {
        if scope.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let query_embedding = self.embedder.embed(query);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut results: Vec<(SubSection, f32)> = Vec::new();
        for id in scope {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let Some(node) = self.entries.get(id) else {
                continue;
            };
            let score = node
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(&query_embedding, e))
                .unwrap_or(0.0);
            results.push((node.clone(), score));
        }

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        results.truncate(top_k);
        results
    }
}
