//! Read-only views of stored documents.
//!
//! Backs the `docs`, `show` and `expand` commands: the document listing,
//! the section outline of one document, and neighbor expansion around a
//! sub-section.

use anyhow::{bail, Result};
use lextree_core::models::{DocumentTree, SubSection, TopSection};
use lextree_core::retrieval::tree_expand;
use lextree_core::store::{StoredDocument, TreeStore};
use lextree_core::tree::combine_pages;
use serde::Serialize;

use crate::config::Config;
use crate::sqlite_store::SqliteTreeStore;

/// One top-level section in a document outline.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineSection {
    pub node_id: String,
    pub head: String,
    pub pages: Vec<u32>,
    pub children: Vec<OutlineChild>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineChild {
    pub node_id: String,
    pub head: String,
    pub pages: Vec<u32>,
}

/// Section outline of a document, in document order.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutline {
    pub doc_id: String,
    /// Union of every section's pages, first-seen order.
    pub pages: Vec<u32>,
    pub sections: Vec<OutlineSection>,
}

/// Build the outline of a loaded tree.
pub fn outline(doc_id: &str, tree: &DocumentTree) -> DocumentOutline {
    let tops: Vec<&TopSection> = tree.top_sections_in_order();
    let subs: Vec<&SubSection> = tree.sub_sections_in_order();

    let sections = tops
        .iter()
        .map(|top| OutlineSection {
            node_id: top.node_id.clone(),
            head: top.head.clone(),
            pages: top.pages.clone(),
            children: top
                .children
                .iter()
                .filter_map(|id| tree.sub_section(id))
                .map(|sub| OutlineChild {
                    node_id: sub.node_id.clone(),
                    head: sub.head.clone(),
                    pages: sub.pages.clone(),
                })
                .collect(),
        })
        .collect();

    DocumentOutline {
        doc_id: doc_id.to_string(),
        pages: combine_pages(&tops, &subs),
        sections,
    }
}

async fn open_document(config: &Config, doc_id: &str) -> Result<(SqliteTreeStore, DocumentTree)> {
    let store = SqliteTreeStore::open(config).await?;
    if !store.exists(doc_id).await? {
        store.close().await;
        bail!("document not found: {}", doc_id);
    }
    let tree = store.load(doc_id).await?;
    Ok((store, tree))
}

fn format_pages(pages: &[u32]) -> String {
    if pages.is_empty() {
        "n/a".to_string()
    } else {
        pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn run_docs(config: &Config) -> Result<()> {
    let store = SqliteTreeStore::open(config).await?;
    let docs: Vec<StoredDocument> = store.list_documents().await?;
    store.close().await;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<24} {:<28} {:>6} {:>6}  INGESTED",
        "DOC_ID", "PDF", "H1", "H2"
    );
    for doc in &docs {
        println!(
            "{:<24} {:<28} {:>6} {:>6}  {}",
            doc.doc_id,
            doc.pdf_name,
            doc.top_sections,
            doc.sub_sections,
            format_ts_iso(doc.ingested_at)
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, doc_id: &str) -> Result<()> {
    let (store, tree) = open_document(config, doc_id).await?;
    store.close().await;
    let outline = outline(doc_id, &tree);

    println!("--- Document ---");
    println!("doc_id: {}", outline.doc_id);
    println!("pages:  {}", format_pages(&outline.pages));
    println!();

    println!("--- Sections ({}) ---", outline.sections.len());
    for section in &outline.sections {
        println!(
            "[{}] {} (p.{})",
            section.node_id,
            section.head,
            format_pages(&section.pages)
        );
        for child in &section.children {
            println!(
                "  [{}] {} (p.{})",
                child.node_id,
                child.head,
                format_pages(&child.pages)
            );
        }
    }
    Ok(())
}

pub async fn run_expand(config: &Config, doc_id: &str, node_id: &str, window: usize) -> Result<()> {
    let (store, tree) = open_document(config, doc_id).await?;
    store.close().await;

    let ids = tree_expand(&tree, node_id, window);
    if ids.is_empty() {
        bail!("sub-section not found: {}", node_id);
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}
