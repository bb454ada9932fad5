//! # lextree CLI (`lextree`)
//!
//! The `lextree` binary ingests heading-structured statutory text into
//! two-level document trees and answers questions over them with
//! citation-safe, literal excerpts.
//!
//! ## Usage
//!
//! ```bash
//! lextree --config ./config/lextree.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lextree init` | Create the SQLite database and schema |
//! | `lextree ingest <path>` | Build and store trees for a file or directory |
//! | `lextree docs` | List stored documents |
//! | `lextree show <doc_id>` | Print a document's section outline |
//! | `lextree ask <doc_id> "<query>"` | Answer a question with citations |
//! | `lextree expand <doc_id> <node_id>` | List neighboring sub-sections |
//!
//! ## Examples
//!
//! ```bash
//! lextree init
//! lextree ingest ./acts/tax_act.md --pdf-name "Tax Act 2020.pdf"
//! lextree ask tax_act "penalty"
//! lextree ask tax_act "what is the penalty for late filing" --json
//! lextree expand tax_act h2_03_02 --window 2
//! ```

use clap::{Parser, Subcommand};
use lextree::{ask, config, get, ingest, migrate};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// lextree: hierarchical BM25 + scoped vector retrieval over statutory text.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lextree.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lextree",
    about = "lextree: hierarchical retrieval with page-level citations over statutory text",
    version,
    long_about = "lextree splits heading-structured documents into top-level sections and \
    sub-sections with page provenance, ranks sections with BM25, narrows to sub-sections with \
    a scoped vector search, and answers with the retrieved text and its citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lextree.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running it
    /// more than once is safe.
    Init,

    /// Ingest a document file or a directory of documents.
    ///
    /// Directories are walked recursively and filtered by the
    /// `[ingestion]` include/exclude globs.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Document id (single file only). Defaults to the file stem.
        #[arg(long)]
        doc_id: Option<String>,

        /// Source name used in citations (single file only). Defaults to `<stem>.pdf`.
        #[arg(long)]
        pdf_name: Option<String>,

        /// Rebuild even when the content hash is unchanged.
        #[arg(long)]
        force: bool,
    },

    /// List stored documents.
    Docs,

    /// Print the section outline of a stored document.
    Show {
        doc_id: String,
    },

    /// Answer a question against a stored document.
    ///
    /// Short queries get section summaries; longer queries get the most
    /// similar sub-sections of the best-ranked sections.
    Ask {
        doc_id: String,

        query: String,

        /// Print the full answer payload as JSON.
        #[arg(long)]
        json: bool,

        /// Number of top-level sections to consider.
        #[arg(long)]
        top_h1: Option<usize>,

        /// Number of sub-sections to return on the detail path.
        #[arg(long)]
        top_h2: Option<usize>,
    },

    /// List sub-sections around a node within its parent section.
    Expand {
        doc_id: String,

        node_id: String,

        /// Positions to include on each side.
        #[arg(long, default_value_t = 1)]
        window: usize,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            doc_id,
            pdf_name,
            force,
        } => {
            let options = ingest::IngestOptions {
                doc_id,
                pdf_name,
                force,
            };
            ingest::run_ingest(&cfg, &path, &options).await?;
        }
        Commands::Docs => {
            get::run_docs(&cfg).await?;
        }
        Commands::Show { doc_id } => {
            get::run_show(&cfg, &doc_id).await?;
        }
        Commands::Ask {
            doc_id,
            query,
            json,
            top_h1,
            top_h2,
        } => {
            ask::run_ask(&cfg, &doc_id, &query, json, top_h1, top_h2).await?;
        }
        Commands::Expand {
            doc_id,
            node_id,
            window,
        } => {
            get::run_expand(&cfg, &doc_id, &node_id, window).await?;
        }
    }
    Ok(())
}
