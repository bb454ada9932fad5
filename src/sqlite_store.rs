//! SQLite-backed [`TreeStore`].
//!
//! A document's tree is spread over three tables keyed by `doc_id`:
//! `top_sections`, `sub_sections` (with the embedding cache as a BLOB) and
//! `section_lookup`. Page lists and child lists are stored as JSON arrays.
//! Saving deletes every row for the document and re-inserts the tree inside
//! one transaction, so a reader never sees a half-replaced tree.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lextree_core::embedding::{blob_to_vec, vec_to_blob};
use lextree_core::models::{DocumentRoot, DocumentTree, LookupEntry, SubSection, TopSection};
use lextree_core::store::{StoredDocument, TreeStore};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate::apply_schema;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct SqliteTreeStore {
    pool: SqlitePool,
}

impl SqliteTreeStore {
    /// Wrap a pool whose schema has been created by
    /// [`apply_schema`](crate::migrate::apply_schema).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if it is
    /// missing.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Save a tree and record the SHA-256 of the text it was built from.
    pub async fn save_with_hash(
        &self,
        root: &DocumentRoot,
        tree: &DocumentTree,
        content_hash: &str,
    ) -> Result<()> {
        self.write_tree(root, tree, Some(content_hash)).await
    }

    /// Content hash recorded for `doc_id`, if the document is stored.
    pub async fn content_hash(&self, doc_id: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM documents WHERE doc_id = ?")
                .bind(doc_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash.filter(|h| !h.is_empty()))
    }

    pub async fn exists(&self, doc_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM documents WHERE doc_id = ?")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Remove a document and all of its sections. Returns whether it existed.
    pub async fn delete(&self, doc_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        delete_sections(&mut tx, doc_id).await?;
        let result = sqlx::query("DELETE FROM documents WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn write_tree(
        &self,
        root: &DocumentRoot,
        tree: &DocumentTree,
        content_hash: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        // A plain save keeps the previously recorded hash
        sqlx::query(
            r#"
            INSERT INTO documents (doc_id, pdf_name, content_hash, ingested_at)
            VALUES (?, ?, COALESCE(?, ''), ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                pdf_name = excluded.pdf_name,
                content_hash = COALESCE(?, documents.content_hash),
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&root.doc_id)
        .bind(&root.pdf_name)
        .bind(content_hash)
        .bind(now)
        .bind(content_hash)
        .execute(&mut *tx)
        .await?;

        delete_sections(&mut tx, &root.doc_id).await?;

        for top in tree.top_sections().values() {
            sqlx::query(
                "INSERT INTO top_sections (doc_id, node_id, head, summary, pages_json, pdf_name, children_json) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&root.doc_id)
            .bind(&top.node_id)
            .bind(&top.head)
            .bind(&top.summary)
            .bind(serde_json::to_string(&top.pages)?)
            .bind(&top.pdf_name)
            .bind(serde_json::to_string(&top.children)?)
            .execute(&mut *tx)
            .await?;
        }

        for sub in tree.sub_sections().values() {
            sqlx::query(
                "INSERT INTO sub_sections (doc_id, node_id, parent, head, text, pages_json, pdf_name, embedding) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&root.doc_id)
            .bind(&sub.node_id)
            .bind(&sub.parent)
            .bind(&sub.head)
            .bind(&sub.text)
            .bind(serde_json::to_string(&sub.pages)?)
            .bind(&sub.pdf_name)
            .bind(sub.embedding.as_deref().map(vec_to_blob))
            .execute(&mut *tx)
            .await?;
        }

        for (top_id, entry) in tree.lookup() {
            sqlx::query(
                "INSERT INTO section_lookup (doc_id, top_id, summary, children_json) VALUES (?, ?, ?, ?)",
            )
            .bind(&root.doc_id)
            .bind(top_id)
            .bind(&entry.summary)
            .bind(serde_json::to_string(&entry.children)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            doc_id = %root.doc_id,
            top_sections = tree.top_sections().len(),
            sub_sections = tree.sub_sections().len(),
            "saved document tree"
        );
        Ok(())
    }
}

async fn delete_sections(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    doc_id: &str,
) -> Result<()> {
    for table in ["top_sections", "sub_sections", "section_lookup"] {
        sqlx::query(&format!("DELETE FROM {} WHERE doc_id = ?", table))
            .bind(doc_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn parse_json_list<T: serde::de::DeserializeOwned>(
    raw: &str,
    what: &str,
    node_id: &str,
) -> Result<Vec<T>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid {} for node {}", what, node_id))
}

#[async_trait]
impl TreeStore for SqliteTreeStore {
    async fn save(&self, root: &DocumentRoot, tree: &DocumentTree) -> Result<()> {
        self.write_tree(root, tree, None).await
    }

    async fn load(&self, doc_id: &str) -> Result<DocumentTree> {
        let top_rows = sqlx::query(
            "SELECT node_id, head, summary, pages_json, pdf_name, children_json FROM top_sections WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tops = Vec::with_capacity(top_rows.len());
        for row in &top_rows {
            let node_id: String = row.get("node_id");
            let pages_json: String = row.get("pages_json");
            let children_json: String = row.get("children_json");
            tops.push(TopSection {
                pages: parse_json_list(&pages_json, "pages", &node_id)?,
                children: parse_json_list(&children_json, "children", &node_id)?,
                head: row.get("head"),
                summary: row.get("summary"),
                pdf_name: row.get("pdf_name"),
                node_id,
            });
        }

        let sub_rows = sqlx::query(
            "SELECT node_id, parent, head, text, pages_json, pdf_name, embedding FROM sub_sections WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        let mut subs = Vec::with_capacity(sub_rows.len());
        for row in &sub_rows {
            let node_id: String = row.get("node_id");
            let pages_json: String = row.get("pages_json");
            let embedding: Option<Vec<u8>> = row.get("embedding");
            subs.push(SubSection {
                pages: parse_json_list(&pages_json, "pages", &node_id)?,
                parent: row.get("parent"),
                head: row.get("head"),
                text: row.get("text"),
                pdf_name: row.get("pdf_name"),
                embedding: embedding.as_deref().map(blob_to_vec),
                node_id,
            });
        }

        let tree = DocumentTree::from_nodes(tops, subs)
            .with_context(|| format!("Stored tree for {} is inconsistent", doc_id))?;

        let lookup_rows = sqlx::query(
            "SELECT top_id, summary, children_json FROM section_lookup WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stored_lookup = BTreeMap::new();
        for row in &lookup_rows {
            let top_id: String = row.get("top_id");
            let children_json: String = row.get("children_json");
            let entry = LookupEntry {
                summary: row.get("summary"),
                children: parse_json_list(&children_json, "children", &top_id)?,
            };
            stored_lookup.insert(top_id, entry);
        }
        if &stored_lookup != tree.lookup() {
            warn!(doc_id = %doc_id, "stored section lookup differs from tree, using derived lookup");
        }

        Ok(tree)
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT d.doc_id, d.pdf_name, d.ingested_at,
                (SELECT COUNT(*) FROM top_sections t WHERE t.doc_id = d.doc_id) AS top_count,
                (SELECT COUNT(*) FROM sub_sections s WHERE s.doc_id = d.doc_id) AS sub_count
            FROM documents d
            ORDER BY d.doc_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let top_count: i64 = row.get("top_count");
                let sub_count: i64 = row.get("sub_count");
                StoredDocument {
                    doc_id: row.get("doc_id"),
                    pdf_name: row.get("pdf_name"),
                    top_sections: top_count as usize,
                    sub_sections: sub_count as usize,
                    ingested_at: row.get("ingested_at"),
                }
            })
            .collect())
    }
}
