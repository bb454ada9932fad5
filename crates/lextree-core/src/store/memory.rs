//! In-memory [`TreeStore`] implementation for tests and embedding.
//!
//! Trees are cloned in and out of a `BTreeMap` behind `std::sync::RwLock`.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentRoot, DocumentTree};

use super::{StoredDocument, TreeStore};

struct StoredTree {
    root: DocumentRoot,
    tree: DocumentTree,
    ingested_at: i64,
}

/// In-memory store keyed by `doc_id`.
#[derive(Default)]
pub struct InMemoryTreeStore {
    trees: RwLock<BTreeMap<String, StoredTree>>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn save(&self, root: &DocumentRoot, tree: &DocumentTree) -> Result<()> {
        let mut trees = self.trees.write().unwrap_or_else(PoisonError::into_inner);
        trees.insert(
            root.doc_id.clone(),
            StoredTree {
                root: root.clone(),
                tree: tree.clone(),
                ingested_at: now_secs(),
            },
        );
        Ok(())
    }

    async fn load(&self, doc_id: &str) -> Result<DocumentTree> {
        let trees = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        Ok(trees
            .get(doc_id)
            .map(|stored| stored.tree.clone())
            .unwrap_or_default())
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let trees = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        Ok(trees
            .values()
            .map(|stored| StoredDocument {
                doc_id: stored.root.doc_id.clone(),
                pdf_name: stored.root.pdf_name.clone(),
                top_sections: stored.tree.top_sections().len(),
                sub_sections: stored.tree.sub_sections().len(),
                ingested_at: stored.ingested_at,
            })
            .collect())
    }
}
