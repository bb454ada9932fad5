//! Storage abstraction for document trees.
//!
//! The [`TreeStore`] trait is the round-trip contract the rest of the crate
//! relies on: `load(doc_id)` after `save(root, tree)` returns an equivalent
//! tree (same node sets, same field values, lookup re-derived). Saving
//! replaces everything previously stored under that `doc_id`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{DocumentRoot, DocumentTree};

/// Summary row for a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub doc_id: String,
    pub pdf_name: String,
    pub top_sections: usize,
    pub sub_sections: usize,
    /// Unix seconds.
    pub ingested_at: i64,
}

/// Abstract persistence backend for [`DocumentTree`]s.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save`](TreeStore::save) | Replace the stored tree for a document |
/// | [`load`](TreeStore::load) | Rebuild a stored tree (empty if unknown) |
/// | [`list_documents`](TreeStore::list_documents) | Enumerate stored documents |
#[async_trait]
pub trait TreeStore: Send + Sync {
    async fn save(&self, root: &DocumentRoot, tree: &DocumentTree) -> Result<()>;

    /// An unknown `doc_id` yields an empty tree, not an error.
    async fn load(&self, doc_id: &str) -> Result<DocumentTree>;

    /// Stored documents ordered by `doc_id`.
    async fn list_documents(&self) -> Result<Vec<StoredDocument>>;
}
