//! Question answering over a stored document.
//!
//! Loads the document tree, rebuilds the BM25 and vector indexes from it
//! (embeddings come from the stored cache) and runs the retrieval pipeline.
//! Indexes live only for the duration of one call.

use anyhow::{bail, Result};
use lextree_core::answer::{AnswerPayload, InferencePipeline};
use lextree_core::index::SectionIndexes;
use lextree_core::retrieval::RetrievalParams;
use lextree_core::store::TreeStore;

use crate::config::Config;
use crate::sqlite_store::SqliteTreeStore;

/// Answer `query` against the tree stored under `doc_id`.
///
/// An unknown document yields an empty tree and therefore an answer with
/// no chunks; callers that need to distinguish check existence first.
pub async fn answer_query(
    store: &dyn TreeStore,
    config: &Config,
    doc_id: &str,
    query: &str,
    params: &RetrievalParams,
) -> Result<AnswerPayload> {
    let mut tree = store.load(doc_id).await?;
    let indexes = SectionIndexes::from_tree(&mut tree, &config.retrieval.index_params());
    let pipeline = InferencePipeline::new(&tree, &indexes, *params);
    Ok(pipeline.answer(query))
}

pub async fn run_ask(
    config: &Config,
    doc_id: &str,
    query: &str,
    json: bool,
    top_h1: Option<usize>,
    top_h2: Option<usize>,
) -> Result<()> {
    let mut params = config.retrieval.retrieval_params();
    if let Some(k) = top_h1 {
        params.top_h1 = k;
    }
    if let Some(k) = top_h2 {
        params.top_h2 = k;
    }
    if params.top_h1 == 0 || params.top_h2 == 0 {
        bail!("--top-h1 and --top-h2 must be >= 1");
    }

    let store = SqliteTreeStore::open(config).await?;

    if !store.exists(doc_id).await? {
        store.close().await;
        bail!("document not found: {}", doc_id);
    }

    let payload = answer_query(&store, config, doc_id, query, &params).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", payload.answer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lextree_core::models::DocumentRoot;
    use lextree_core::store::memory::InMemoryTreeStore;
    use lextree_core::tree::{build_tree, IngestionConfig};

    const ACT: &str = "# Penalties\n[[PAGE 2]]\n## Late filing\nThe penalty for late filing is a fine.\n\
        # Appeals\n[[PAGE 5]]\nAppeals go to the tribunal.\n";

    #[tokio::test]
    async fn test_answer_query_against_memory_store() {
        let store = InMemoryTreeStore::new();
        let tree = build_tree(ACT, &IngestionConfig::new("act", "act.pdf")).unwrap();
        store
            .save(&DocumentRoot::new("act", "act.pdf"), &tree)
            .await
            .unwrap();

        let config = Config::minimal("unused.sqlite");
        let params = config.retrieval.retrieval_params();

        let overview = answer_query(&store, &config, "act", "tribunal", &params)
            .await
            .unwrap();
        assert_eq!(overview.chunks[0].node_id, "h1_02");
        assert_eq!(overview.citations[0], "act.pdf p.5 [h1_02]");

        let detail = answer_query(&store, &config, "act", "what is the penalty for late filing", &params)
            .await
            .unwrap();
        assert_eq!(detail.chunks[0].node_id, "h2_01_01");
        assert!(detail.answer.contains("- The penalty for late filing is a fine."));
    }

    #[tokio::test]
    async fn test_unknown_document_gives_empty_answer() {
        let store = InMemoryTreeStore::new();
        let config = Config::minimal("unused.sqlite");
        let payload = answer_query(&store, &config, "missing", "penalty", &RetrievalParams::default())
            .await
            .unwrap();
        assert!(payload.chunks.is_empty());
        assert!(payload.citations.is_empty());
    }
}
