use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::ChunkerOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_boundary_lookback")]
    pub boundary_lookback: usize,
    #[serde(default = "default_boundary_chars")]
    pub boundary_chars: String,
    /// `flat` marks every chunk a parent; `hierarchical` stores the whole
    /// document as a parent and its sub-splits as children.
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            boundary_lookback: default_boundary_lookback(),
            boundary_chars: default_boundary_chars(),
            strategy: default_strategy(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker_options(&self) -> ChunkerOptions {
        ChunkerOptions {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            boundary_lookback: self.boundary_lookback,
            boundary_chars: self.boundary_chars.clone(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_boundary_lookback() -> usize {
    100
}
fn default_boundary_chars() -> String {
    " \n\t.!?".to_string()
}
fn default_strategy() -> String {
    "flat".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama_url: default_ollama_url(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Maximum chunks embedded concurrently within one document.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("docs")
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.md", "**/*.txt", "**/*.py", "**/*.java", "**/*.js", "**/*.vue", "**/*.sql",
        "**/*.xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    match config.chunking.strategy.as_str() {
        "flat" | "hierarchical" => {}
        other => anyhow::bail!(
            "Unknown chunking strategy: '{}'. Must be flat or hierarchical.",
            other
        ),
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    if config.ingest.concurrency == 0 {
        anyhow::bail!("ingest.concurrency must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    Ok(config)
}
