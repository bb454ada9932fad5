//! # lextree
//!
//! Hierarchical retrieval over heading-structured statutory text, with
//! page-level citations.
//!
//! Documents are split into top-level sections and sub-sections (see
//! [`lextree_core::tree`]). Queries are ranked against section summaries
//! with BM25, and longer queries are narrowed to the most similar
//! sub-sections of the best sections. Answers are the retrieved text
//! itself plus `"<pdf> p.<pages> [<node_id>]"` citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌──────────────┐
//! │  Markdown  │──▶│  Tree builder │──▶│    SQLite    │
//! │ file / dir │   │ + summarizer  │   │ tree + embed │
//! └────────────┘   └───────────────┘   └──────┬───────┘
//!                                             │
//!                                             ▼
//!                                   ┌───────────────────┐
//!                                   │ BM25 → vector →   │
//!                                   │ citation answer   │
//!                                   └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`summarizer`] | Built-in and HTTP summarizers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite tree storage |
//! | [`ingest`] | File and directory ingestion |
//! | [`ask`] | Question answering |
//! | [`get`] | Document listing, outline, neighbor expansion |

pub mod ask;
pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod sqlite_store;
pub mod summarizer;
