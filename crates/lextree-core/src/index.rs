//! Paired BM25 + vector indexes for one document tree.
//!
//! [`SectionIndexes::add_tree`] puts every top-level section into the BM25
//! index and every sub-section into the vector index, both in document
//! order so that score ties resolve the way the document reads. Embeddings
//! computed on the way in are written back into the tree, which means a
//! stored tree only ever pays for each embedding once.
//!
//! [`SharedIndexes`] is the cross-thread form: writers take an exclusive
//! lock per `add_tree`, readers share a lock for searches.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::embedding::{Embedder, DEFAULT_EMBEDDING_DIM};
use crate::lexical::{Bm25Index, DEFAULT_B, DEFAULT_K1};
use crate::models::{DocumentTree, SubSection};
use crate::similarity::VectorIndex;

/// Construction parameters for a [`SectionIndexes`] pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexParams {
    pub bm25_k1: f64,
    pub bm25_b: f64,
    pub embedding_dim: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            bm25_k1: DEFAULT_K1,
            bm25_b: DEFAULT_B,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// The lexical and similarity indexes queried by the retrieval agent.
#[derive(Debug, Clone, Default)]
pub struct SectionIndexes {
    pub bm25: Bm25Index,
    pub vector: VectorIndex,
}

impl SectionIndexes {
    pub fn new(params: &IndexParams) -> Self {
        Self {
            bm25: Bm25Index::new(params.bm25_k1, params.bm25_b),
            vector: VectorIndex::new(params.embedding_dim),
        }
    }

    /// Use a custom embedder for the vector side.
    pub fn with_embedder(params: &IndexParams, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            bm25: Bm25Index::new(params.bm25_k1, params.bm25_b),
            vector: VectorIndex::with_embedder(embedder),
        }
    }

    /// Build indexes for `tree`, caching embeddings on its sub-sections.
    pub fn from_tree(tree: &mut DocumentTree, params: &IndexParams) -> Self {
        let mut indexes = Self::new(params);
        indexes.add_tree(tree);
        indexes
    }

    /// Index every node of `tree` in document order.
    pub fn add_tree(&mut self, tree: &mut DocumentTree) {
        for top in tree.top_sections_in_order() {
            self.bm25.add(top);
        }

        let subs: Vec<SubSection> = tree.sub_sections_in_order().into_iter().cloned().collect();
        let mut computed = 0usize;
        for sub in &subs {
            let embedding = self.vector.add(sub);
            if sub.embedding.as_deref() != Some(embedding) {
                tree.set_embedding(&sub.node_id, embedding.to_vec());
                computed += 1;
            }
        }

        debug!(
            top_sections = self.bm25.len(),
            sub_sections = self.vector.len(),
            embeddings_computed = computed,
            "indexed document tree"
        );
    }
}

/// [`SectionIndexes`] behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct SharedIndexes {
    inner: RwLock<SectionIndexes>,
}

impl SharedIndexes {
    pub fn new(indexes: SectionIndexes) -> Self {
        Self {
            inner: RwLock::new(indexes),
        }
    }

    /// Index a tree while holding the write lock.
    pub fn add_tree(&self, tree: &mut DocumentTree) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.add_tree(tree);
    }

    /// Shared access for searches. Holding the guard blocks writers.
    pub fn read(&self) -> RwLockReadGuard<'_, SectionIndexes> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> SectionIndexes {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
