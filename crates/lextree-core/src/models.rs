//! Document tree data model.
//!
//! A [`DocumentTree`] owns two node maps: top-level sections ("H1") and
//! their sub-sections ("H2"). Every sub-section points back at its parent
//! by id, and every top-level section lists its children in document order.
//! The `lookup` view is derived from the two maps and is never edited on
//! its own.
//!
//! Trees are only constructed through [`DocumentTree::from_nodes`] (or the
//! tree builder, which calls it), so the referential invariants hold for
//! every value of this type:
//!
//! - node ids are unique across both maps,
//! - every `SubSection::parent` is a key of the top-level map,
//! - every id in `TopSection::children` is a key of the sub-section map,
//! - every sub-section is listed by its parent.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRoot {
    pub doc_id: String,
    pub pdf_name: String,
}

impl DocumentRoot {
    pub fn new(doc_id: impl Into<String>, pdf_name: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            pdf_name: pdf_name.into(),
        }
    }
}

/// A top-level ("H1") section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSection {
    /// `<prefix>_NN`.
    pub node_id: String,
    pub head: String,
    pub summary: String,
    /// Sorted ascending, no duplicates.
    pub pages: Vec<u32>,
    pub pdf_name: String,
    /// Sub-section ids in document order.
    pub children: Vec<String>,
}

/// A sub-section ("H2"), the leaf content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSection {
    /// `<prefix>_NN_MM`.
    pub node_id: String,
    /// Owning [`TopSection::node_id`].
    pub parent: String,
    pub head: String,
    pub text: String,
    /// Sorted ascending, no duplicates.
    pub pages: Vec<u32>,
    pub pdf_name: String,
    /// Cached embedding, filled the first time the node is indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Denormalized per-section view used by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub summary: String,
    pub children: Vec<String>,
}

/// Invariant violations in a document tree.
///
/// These are programming-contract errors and are kept separate from the
/// soft cases (missing ids, empty input) which never produce an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("duplicate node id in tree: {0}")]
    DuplicateNodeId(String),
    #[error("sub-section {node_id} references missing parent {parent}")]
    DanglingParent { node_id: String, parent: String },
    #[error("top section {parent} lists missing child {child}")]
    DanglingChild { parent: String, child: String },
    #[error("sub-section {node_id} is not listed as a child of {parent}")]
    OrphanSubSection { node_id: String, parent: String },
}

/// The aggregate root: all sections of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentTree {
    top_sections: BTreeMap<String, TopSection>,
    sub_sections: BTreeMap<String, SubSection>,
    lookup: BTreeMap<String, LookupEntry>,
}

impl DocumentTree {
    /// An empty tree (a document without any top-level heading).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a tree from its nodes, validating referential closure and
    /// deriving the lookup view.
    pub fn from_nodes(
        top_sections: Vec<TopSection>,
        sub_sections: Vec<SubSection>,
    ) -> Result<Self, TreeError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for id in top_sections
            .iter()
            .map(|n| n.node_id.as_str())
            .chain(sub_sections.iter().map(|n| n.node_id.as_str()))
        {
            if !seen.insert(id) {
                return Err(TreeError::DuplicateNodeId(id.to_string()));
            }
        }

        let tops: BTreeMap<String, TopSection> = top_sections
            .into_iter()
            .map(|n| (n.node_id.clone(), n))
            .collect();
        let subs: BTreeMap<String, SubSection> = sub_sections
            .into_iter()
            .map(|n| (n.node_id.clone(), n))
            .collect();

        for top in tops.values() {
            let mut listed: HashSet<&str> = HashSet::new();
            for child in &top.children {
                if !listed.insert(child.as_str()) {
                    return Err(TreeError::DuplicateNodeId(child.clone()));
                }
                if !subs.contains_key(child) {
                    return Err(TreeError::DanglingChild {
                        parent: top.node_id.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        for sub in subs.values() {
            let parent = tops
                .get(&sub.parent)
                .ok_or_else(|| TreeError::DanglingParent {
                    node_id: sub.node_id.clone(),
                    parent: sub.parent.clone(),
                })?;
            if !parent.children.iter().any(|c| c == &sub.node_id) {
                return Err(TreeError::OrphanSubSection {
                    node_id: sub.node_id.clone(),
                    parent: sub.parent.clone(),
                });
            }
        }

        let lookup = derive_lookup(&tops);
        Ok(Self {
            top_sections: tops,
            sub_sections: subs,
            lookup,
        })
    }

    pub fn top_sections(&self) -> &BTreeMap<String, TopSection> {
        &self.top_sections
    }

    pub fn sub_sections(&self) -> &BTreeMap<String, SubSection> {
        &self.sub_sections
    }

    pub fn lookup(&self) -> &BTreeMap<String, LookupEntry> {
        &self.lookup
    }

    pub fn top_section(&self, node_id: &str) -> Option<&TopSection> {
        self.top_sections.get(node_id)
    }

    pub fn sub_section(&self, node_id: &str) -> Option<&SubSection> {
        self.sub_sections.get(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.top_sections.is_empty()
    }

    /// Top-level sections in document order.
    pub fn top_sections_in_order(&self) -> Vec<&TopSection> {
        let mut nodes: Vec<&TopSection> = self.top_sections.values().collect();
        nodes.sort_by(|a, b| document_order(&a.node_id, &b.node_id));
        nodes
    }

    /// Sub-sections in document order (parents in order, then `children`).
    pub fn sub_sections_in_order(&self) -> Vec<&SubSection> {
        self.top_sections_in_order()
            .into_iter()
            .flat_map(|top| top.children.iter())
            .filter_map(|id| self.sub_sections.get(id))
            .collect()
    }

    /// Cache an embedding on a sub-section. Unknown ids are ignored.
    pub fn set_embedding(&mut self, node_id: &str, embedding: Vec<f32>) {
        if let Some(node) = self.sub_sections.get_mut(node_id) {
            node.embedding = Some(embedding);
        }
    }

    /// Recompute the lookup view from the node maps.
    pub fn derived_lookup(&self) -> BTreeMap<String, LookupEntry> {
        derive_lookup(&self.top_sections)
    }
}

fn derive_lookup(tops: &BTreeMap<String, TopSection>) -> BTreeMap<String, LookupEntry> {
    tops.values()
        .map(|top| {
            (
                top.node_id.clone(),
                LookupEntry {
                    summary: top.summary.clone(),
                    children: top.children.clone(),
                },
            )
        })
        .collect()
}

/// Order node ids as the builder numbered them.
///
/// Counters are zero-padded to at least two digits, so comparing by length
/// first and then lexically gives numeric order for ids sharing a prefix.
pub fn document_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
