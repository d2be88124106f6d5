use anyhow::{Context, Result};
use rootcause_core::cache::DEFAULT_TTL;
use rootcause_core::chunk::ChunkLimits;
use rootcause_core::correlate::{
    ScoringParams, Weights, DEFAULT_FILENAME_CREDIT, DEFAULT_HALF_LIFE_DAYS,
    DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MIN_SCORE, DEFAULT_PARTIAL_PENALTY,
};
use rootcause_core::store::{DEFAULT_MIN_SIMILARITY, DEFAULT_TOP_K};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_url")]
    pub url: String,
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: default_cache_url(),
            ttl_days: default_ttl_days(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * SECS_PER_DAY)
    }
}

fn default_cache_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_ttl_days() -> u64 {
    DEFAULT_TTL.as_secs() / SECS_PER_DAY
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            max_bytes: default_max_bytes(),
            min_lines: default_min_lines(),
        }
    }
}

impl ChunkingConfig {
    pub fn limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_lines: self.max_lines,
            max_bytes: self.max_bytes,
            min_lines: self.min_lines,
        }
    }
}

fn default_max_lines() -> usize {
    ChunkLimits::default().max_lines
}
fn default_max_bytes() -> usize {
    ChunkLimits::default().max_bytes
}
fn default_min_lines() -> usize {
    ChunkLimits::default().min_lines
}

/// Crawler settings applied on top of the built-in index filter.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrelationConfig {
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_partial_penalty")]
    pub semantic_partial_penalty: f64,
    #[serde(default = "default_filename_credit")]
    pub path_filename_credit: f64,
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    #[serde(default)]
    pub weights: Weights,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            min_score: default_min_score(),
            semantic_partial_penalty: default_partial_penalty(),
            path_filename_credit: default_filename_credit(),
            max_query_length: default_max_query_length(),
            weights: Weights::default(),
        }
    }
}

impl CorrelationConfig {
    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            half_life_days: self.half_life_days,
            partial_penalty: self.semantic_partial_penalty,
            filename_credit: self.path_filename_credit,
            weights: self.weights,
            min_score: self.min_score,
        }
    }
}

fn default_half_life_days() -> f64 {
    DEFAULT_HALF_LIFE_DAYS
}
fn default_min_score() -> f64 {
    DEFAULT_MIN_SCORE
}
fn default_partial_penalty() -> f64 {
    DEFAULT_PARTIAL_PENALTY
}
fn default_filename_credit() -> f64 {
    DEFAULT_FILENAME_CREDIT
}
fn default_max_query_length() -> usize {
    DEFAULT_MAX_QUERY_LENGTH
}

impl Config {
    /// Defaults for commands that never touch the database or cache.
    pub fn minimal() -> Self {
        Self {
            database: DatabaseConfig {
                url: String::new(),
                max_connections: default_max_connections(),
            },
            cache: CacheConfig::default(),
            chunking: ChunkingConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            correlation: CorrelationConfig::default(),
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

/// Load the config for commands that can run without one.
///
/// A missing file yields [`Config::minimal`]. A file that exists but
/// fails to parse or validate is still an error.
pub fn load_config_or_minimal(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    if config.database.url.trim().is_empty() {
        anyhow::bail!("database.url must be set");
    }
    if config.database.max_connections == 0 {
        anyhow::bail!("database.max_connections must be > 0");
    }

    if config.cache.ttl_days == 0 {
        anyhow::bail!("cache.ttl_days must be > 0");
    }

    // Validate chunking
    let chunking = &config.chunking;
    if chunking.max_lines == 0 || chunking.max_bytes == 0 || chunking.min_lines == 0 {
        anyhow::bail!("chunking.max_lines, max_bytes and min_lines must be > 0");
    }
    if chunking.min_lines > chunking.max_lines {
        anyhow::bail!(
            "chunking.min_lines ({}) must not exceed chunking.max_lines ({})",
            chunking.min_lines,
            chunking.max_lines
        );
    }

    for pattern in &config.index.exclude_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("Invalid index.exclude_globs pattern: '{}'", pattern))?;
    }

    // Validate search
    if config.search.top_k == 0 {
        anyhow::bail!("search.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.search.min_similarity) {
        anyhow::bail!("search.min_similarity must be in [0.0, 1.0]");
    }

    // Validate correlation
    let correlation = &config.correlation;
    if correlation.half_life_days.is_nan() || correlation.half_life_days <= 0.0 {
        anyhow::bail!("correlation.half_life_days must be > 0");
    }
    for (name, value) in [
        ("min_score", correlation.min_score),
        ("semantic_partial_penalty", correlation.semantic_partial_penalty),
        ("path_filename_credit", correlation.path_filename_credit),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("correlation.{} must be in [0.0, 1.0]", name);
        }
    }
    if correlation.max_query_length == 0 {
        anyhow::bail!("correlation.max_query_length must be > 0");
    }
    correlation
        .weights
        .validate()
        .context("Invalid correlation.weights")?;

    Ok(())
}
