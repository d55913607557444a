use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_words: default_chunk_words(),
            overlap_words: default_overlap_words(),
        }
    }
}

fn default_chunk_words() -> usize {
    500
}
fn default_overlap_words() -> usize {
    50
}

/// Per-round retrieval bounds for the research pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_round1_k")]
    pub round1_k: usize,
    #[serde(default)]
    pub round1_min_score: f64,
    #[serde(default = "default_round2_k")]
    pub round2_k: usize,
    #[serde(default)]
    pub round2_min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            round1_k: default_round1_k(),
            round1_min_score: 0.0,
            round2_k: default_round2_k(),
            round2_min_score: 0.0,
        }
    }
}

impl RetrievalConfig {
    pub fn round1(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.round1_k,
            min_score: self.round1_min_score,
        }
    }

    /// Bounds applied independently to each gap question.
    pub fn round2(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.round2_k,
            min_score: self.round2_min_score,
        }
    }
}

fn default_round1_k() -> usize {
    10
}
fn default_round2_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on one generation call; an expired call counts as a
    /// failure eligible for the single retry.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    45
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_words == 0 {
        anyhow::bail!("chunking.chunk_words must be > 0");
    }
    if config.chunking.overlap_words >= config.chunking.chunk_words {
        anyhow::bail!("chunking.overlap_words must be < chunking.chunk_words");
    }

    if config.retrieval.round1_k == 0 || config.retrieval.round2_k == 0 {
        anyhow::bail!("retrieval round sizes must be >= 1");
    }
    if config.retrieval.round1_min_score < 0.0 || config.retrieval.round2_min_score < 0.0 {
        anyhow::bail!("retrieval min scores must be >= 0.0");
    }

    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }
    if !(1..=300).contains(&config.generation.timeout_secs) {
        anyhow::bail!("generation.timeout_secs must be between 1 and 300");
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
