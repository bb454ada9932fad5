use anyhow::{Context, Result};
use lextree_core::embedding::DEFAULT_EMBEDDING_DIM;
use lextree_core::index::IndexParams;
use lextree_core::lexical::{DEFAULT_B, DEFAULT_K1};
use lextree_core::retrieval::{
    RetrievalParams, DEFAULT_DETAIL_WORD_THRESHOLD, DEFAULT_TOP_H1, DEFAULT_TOP_H2,
};
use lextree_core::summarize::{DEFAULT_MAX_CHARS, DEFAULT_MAX_SENTENCES};
use lextree_core::tree::{DEFAULT_SUB_PREFIX, DEFAULT_TOP_PREFIX};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionSettings {
    #[serde(default = "default_top_prefix")]
    pub top_prefix: String,
    #[serde(default = "default_sub_prefix")]
    pub sub_prefix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            top_prefix: default_top_prefix(),
            sub_prefix: default_sub_prefix(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_top_prefix() -> String {
    DEFAULT_TOP_PREFIX.to_string()
}
fn default_sub_prefix() -> String {
    DEFAULT_SUB_PREFIX.to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_h1")]
    pub top_h1: usize,
    #[serde(default = "default_top_h2")]
    pub top_h2: usize,
    #[serde(default = "default_detail_word_threshold")]
    pub detail_word_threshold: usize,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_h1: DEFAULT_TOP_H1,
            top_h2: DEFAULT_TOP_H2,
            detail_word_threshold: DEFAULT_DETAIL_WORD_THRESHOLD,
            bm25_k1: DEFAULT_K1,
            bm25_b: DEFAULT_B,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

fn default_top_h1() -> usize {
    DEFAULT_TOP_H1
}
fn default_top_h2() -> usize {
    DEFAULT_TOP_H2
}
fn default_detail_word_threshold() -> usize {
    DEFAULT_DETAIL_WORD_THRESHOLD
}
fn default_bm25_k1() -> f64 {
    DEFAULT_K1
}
fn default_bm25_b() -> f64 {
    DEFAULT_B
}
fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

impl RetrievalConfig {
    pub fn index_params(&self) -> IndexParams {
        IndexParams {
            bm25_k1: self.bm25_k1,
            bm25_b: self.bm25_b,
            embedding_dim: self.embedding_dim,
        }
    }

    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            top_h1: self.top_h1,
            top_h2: self.top_h2,
            detail_word_threshold: self.detail_word_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            template: default_template(),
            max_sentences: DEFAULT_MAX_SENTENCES,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

fn default_provider() -> String {
    "builtin".to_string()
}
fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_template() -> String {
    "Summarize the following legal section in 1-2 sentences without adding new facts:\n\n{text}"
        .to_string()
}
fn default_max_sentences() -> usize {
    DEFAULT_MAX_SENTENCES
}
fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

impl Config {
    /// All-defaults configuration with the database at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            ingestion: IngestionSettings::default(),
            retrieval: RetrievalConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate ingestion
    let ingestion = &config.ingestion;
    if ingestion.top_prefix.is_empty() || ingestion.sub_prefix.is_empty() {
        anyhow::bail!("ingestion.top_prefix and ingestion.sub_prefix must not be empty");
    }
    if ingestion.top_prefix == ingestion.sub_prefix {
        anyhow::bail!("ingestion.top_prefix and ingestion.sub_prefix must differ");
    }

    // Validate retrieval
    let retrieval = &config.retrieval;
    if retrieval.top_h1 < 1 {
        anyhow::bail!("retrieval.top_h1 must be >= 1");
    }
    if retrieval.top_h2 < 1 {
        anyhow::bail!("retrieval.top_h2 must be >= 1");
    }
    if retrieval.bm25_k1 < 0.0 {
        anyhow::bail!("retrieval.bm25_k1 must be >= 0.0");
    }
    if !(0.0..=1.0).contains(&retrieval.bm25_b) {
        anyhow::bail!("retrieval.bm25_b must be in [0.0, 1.0]");
    }
    if retrieval.embedding_dim == 0 {
        anyhow::bail!("retrieval.embedding_dim must be > 0");
    }

    // Validate summarizer
    let summarizer = &config.summarizer;
    if summarizer.max_chars < 2 {
        anyhow::bail!("summarizer.max_chars must be >= 2");
    }
    match summarizer.provider.as_str() {
        "builtin" => {}
        "http" => {
            if summarizer.url.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("summarizer.url must be specified when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be builtin or http.",
            other
        ),
    }
    if !summarizer.template.contains("{text}") {
        anyhow::bail!("summarizer.template must contain the {{text}} placeholder");
    }

    Ok(())
}
