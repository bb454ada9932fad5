//! Document ingestion.
//!
//! Reads heading-structured text from a file or a directory tree, builds
//! the document tree (summaries included), computes sub-section embeddings
//! and saves the result. Documents whose content hash matches the stored
//! one are skipped unless `--force` is given.
//!
//! Tree building runs on a blocking thread: the configured summarizer may
//! perform blocking HTTP requests.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use lextree_core::index::SectionIndexes;
use lextree_core::models::{DocumentRoot, DocumentTree};
use lextree_core::tree::{build_tree, IngestionConfig};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::sqlite_store::SqliteTreeStore;
use crate::summarizer::create_summarizer;

/// Per-invocation overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub doc_id: Option<String>,
    pub pdf_name: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Ingested {
        top_sections: usize,
        sub_sections: usize,
    },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub pdf_name: String,
    pub path: PathBuf,
    pub status: IngestStatus,
}

pub async fn run_ingest(config: &Config, path: &Path, options: &IngestOptions) -> Result<()> {
    let files = collect_files(config, path)?;
    if files.is_empty() {
        bail!("No matching documents found under {}", path.display());
    }
    if files.len() > 1 && (options.doc_id.is_some() || options.pdf_name.is_some()) {
        bail!("--doc-id and --pdf-name can only be used when ingesting a single file");
    }

    let store = SqliteTreeStore::open(config).await?;

    let mut ingested = 0u64;
    let mut unchanged = 0u64;

    for file in &files {
        let outcome = ingest_file(config, &store, file, options).await?;
        println!("ingest {} -> {}", outcome.path.display(), outcome.doc_id);
        match outcome.status {
            IngestStatus::Ingested {
                top_sections,
                sub_sections,
            } => {
                println!("  top sections: {}", top_sections);
                println!("  sub sections: {}", sub_sections);
                ingested += 1;
            }
            IngestStatus::Unchanged => {
                println!("  unchanged (skipped)");
                unchanged += 1;
            }
        }
    }

    if files.len() > 1 {
        println!("documents ingested: {}", ingested);
        println!("documents unchanged: {}", unchanged);
    }
    println!("ok");

    store.close().await;
    Ok(())
}

/// Ingest one file into `store`.
pub async fn ingest_file(
    config: &Config,
    store: &SqliteTreeStore,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestOutcome> {
    let markdown = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let root = document_root(path, options)?;
    let hash = content_hash(&markdown);

    if !options.force && store.content_hash(&root.doc_id).await?.as_deref() == Some(hash.as_str()) {
        debug!(doc_id = %root.doc_id, "content unchanged, skipping");
        return Ok(IngestOutcome {
            doc_id: root.doc_id,
            pdf_name: root.pdf_name,
            path: path.to_path_buf(),
            status: IngestStatus::Unchanged,
        });
    }

    let build_config = config.clone();
    let build_root = root.clone();
    let tree = tokio::task::spawn_blocking(move || {
        build_document(&build_config, &markdown, &build_root)
    })
    .await
    .context("Tree build task failed")??;

    store.save_with_hash(&root, &tree, &hash).await?;

    Ok(IngestOutcome {
        status: IngestStatus::Ingested {
            top_sections: tree.top_sections().len(),
            sub_sections: tree.sub_sections().len(),
        },
        doc_id: root.doc_id,
        pdf_name: root.pdf_name,
        path: path.to_path_buf(),
    })
}

/// Build a document tree with its embeddings cached on the sub-sections.
///
/// Must run outside the async runtime when the summarizer provider is
/// `http`, since that provider performs blocking requests.
pub fn build_document(
    config: &Config,
    markdown: &str,
    root: &DocumentRoot,
) -> Result<DocumentTree> {
    let summarizer = create_summarizer(&config.summarizer)?;
    let ingestion = IngestionConfig::new(root.doc_id.clone(), root.pdf_name.clone())
        .with_prefixes(
            config.ingestion.top_prefix.clone(),
            config.ingestion.sub_prefix.clone(),
        )
        .with_summarizer(summarizer);

    let mut tree = build_tree(markdown, &ingestion)
        .with_context(|| format!("Failed to build tree for {}", root.doc_id))?;
    let _ = SectionIndexes::from_tree(&mut tree, &config.retrieval.index_params());
    Ok(tree)
}

/// Hex SHA-256 of the document text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `doc_id` defaults to the file stem and `pdf_name` to `<stem>.pdf`.
fn document_root(path: &Path, options: &IngestOptions) -> Result<DocumentRoot> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a document id from {}", path.display()))?;

    let doc_id = options.doc_id.clone().unwrap_or_else(|| stem.clone());
    let pdf_name = options
        .pdf_name
        .clone()
        .unwrap_or_else(|| format!("{}.pdf", stem));
    Ok(DocumentRoot::new(doc_id, pdf_name))
}

/// A single file as given, or the matching files under a directory in
/// sorted order.
pub fn collect_files(config: &Config, path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let include_set = build_globset(&config.ingestion.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    default_excludes.extend(config.ingestion.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file = entry.path();
        let relative = file.strip_prefix(path).unwrap_or(file);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(file.to_path_buf());
    }

    // Sort for deterministic ordering
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
