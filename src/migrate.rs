use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per ingested document
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            doc_id TEXT PRIMARY KEY,
            pdf_name TEXT NOT NULL,
            content_hash TEXT NOT NULL DEFAULT '',
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS top_sections (
            doc_id TEXT NOT NULL,
            node_id TEXT NOT NULL,
            head TEXT NOT NULL,
            summary TEXT NOT NULL,
            pages_json TEXT NOT NULL DEFAULT '[]',
            pdf_name TEXT NOT NULL,
            children_json TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (doc_id, node_id),
            FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embeddings are little-endian f32 blobs, NULL until computed
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sub_sections (
            doc_id TEXT NOT NULL,
            node_id TEXT NOT NULL,
            parent TEXT NOT NULL,
            head TEXT NOT NULL,
            text TEXT NOT NULL,
            pages_json TEXT NOT NULL DEFAULT '[]',
            pdf_name TEXT NOT NULL,
            embedding BLOB,
            PRIMARY KEY (doc_id, node_id),
            FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS section_lookup (
            doc_id TEXT NOT NULL,
            top_id TEXT NOT NULL,
            summary TEXT NOT NULL,
            children_json TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (doc_id, top_id),
            FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sub_sections_parent ON sub_sections(doc_id, parent)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
