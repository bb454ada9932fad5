//! # lextree core
//!
//! Shared, I/O-free logic for lextree: the two-level document tree model,
//! the markdown tree builder, the BM25 index over top-level sections, the
//! scoped vector index over sub-sections, and the retrieval orchestrator
//! that combines them into a citation-safe answer.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Collaborators (summarizers, tree stores) are injected through the
//! [`summarize::Summarizer`] and [`store::TreeStore`] traits.
//!
//! ```text
//! markdown ──▶ tree::build_tree ──▶ DocumentTree ──▶ index::SectionIndexes
//!                                                     │            │
//!                                               Bm25Index     VectorIndex
//!                                                     │            │
//!                                                     └─▶ retrieval ◀┘ ──▶ answer
//! ```

pub mod answer;
pub mod embedding;
pub mod index;
pub mod lexical;
pub mod models;
pub mod retrieval;
pub mod similarity;
pub mod store;
pub mod summarize;
pub mod text;
pub mod tree;
