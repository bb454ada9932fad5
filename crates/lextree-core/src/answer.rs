//! Citation-safe answer assembly.
//!
//! The answer is the retrieved text itself laid out as a bulleted list,
//! followed by the citations. Nothing is paraphrased or generated.

use serde::Serialize;

use crate::index::SectionIndexes;
use crate::models::DocumentTree;
use crate::retrieval::{RetrievalAgent, RetrievalParams, RetrievalResult, RetrievedChunk};

/// First line of every answer.
pub const ANSWER_PREAMBLE: &str =
    "Retrieved statutory context (no additional interpretation applied):";

const POLICY: &str = "BM25 routing -> scoped vector search -> citation-safe answer";

/// What a caller gets back for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerPayload {
    pub answer: String,
    pub citations: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
}

/// Retrieval followed by answer formatting.
#[derive(Debug, Clone, Copy)]
pub struct InferencePipeline<'a> {
    agent: RetrievalAgent<'a>,
    params: RetrievalParams,
}

impl<'a> InferencePipeline<'a> {
    pub fn new(tree: &'a DocumentTree, indexes: &'a SectionIndexes, params: RetrievalParams) -> Self {
        Self {
            agent: RetrievalAgent::new(tree, &indexes.bm25, &indexes.vector),
            params,
        }
    }

    pub fn answer(&self, query: &str) -> AnswerPayload {
        let result = self.agent.retrieve(query, &self.params);
        AnswerPayload {
            answer: format_answer(&result),
            citations: result.citations,
            chunks: result.chunks,
        }
    }

    /// One-line description of the retrieval policy.
    pub fn policy() -> &'static str {
        POLICY
    }
}

/// Render a retrieval result as answer text.
pub fn format_answer(result: &RetrievalResult) -> String {
    let mut lines = vec![ANSWER_PREAMBLE.to_string()];
    lines.extend(result.chunks.iter().map(|c| format!("- {}", c.text.trim())));
    lines.push(String::new());
    lines.push("Citations:".to_string());
    lines.extend(result.citations.iter().map(|c| format!("- {}", c)));
    lines.join("\n").trim().to_string()
}
