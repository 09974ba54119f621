//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` and `[source]` is optional and falls back to
//! its defaults. [`load_config`] reads the file and rejects values the rest
//! of the program cannot work with.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use lore_core::context::ContextParams;
use lore_core::index::{ChangePolicy, IndexOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub context: ContextParams,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.mdx".to_string(),
        "**/*.txt".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default)]
    pub change_policy: ChangePolicy,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            change_policy: ChangePolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
            url: None,
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    120
}

impl Config {
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            policy: self.indexing.change_policy,
            concurrency: self.indexing.concurrency,
            batch_size: self.embedding.batch_size,
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

fn validate(config: &Config) -> Result<()> {
    // Context selection
    if config.context.match_count < 1 {
        bail!("context.match_count must be >= 1");
    }
    if config.context.recent_count < 1 {
        bail!("context.recent_count must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.context.similarity_threshold) {
        bail!("context.similarity_threshold must be in [-1.0, 1.0]");
    }

    if config.indexing.concurrency < 1 {
        bail!("indexing.concurrency must be >= 1");
    }

    // Embedding
    if config.embedding.batch_size < 1 {
        bail!("embedding.batch_size must be >= 1");
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.unwrap_or(0) == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Completion
    if config.completion.is_enabled() && config.completion.model.is_none() {
        bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    match config.completion.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/lore.sqlite"

[source]
root = "./docs"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{MINIMAL}{extra}"))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.source.include_globs.len(), 3);
        assert_eq!(config.indexing.change_policy, ChangePolicy::Checksum);
        assert_eq!(config.indexing.concurrency, 4);
        assert_eq!(config.context, ContextParams::default());
        assert!(!config.embedding.is_enabled());
        assert!(!config.completion.is_enabled());
        assert_eq!(config.index_options().batch_size, 64);
    }

    #[test]
    fn test_change_policy_kebab_case() {
        let config = parse("\n[indexing]\nchange_policy = \"path-exists\"\n").unwrap();
        assert_eq!(config.indexing.change_policy, ChangePolicy::PathExists);
        assert!(parse("\n[indexing]\nchange_policy = \"mtime\"\n").is_err());
    }

    #[test]
    fn test_partial_context_section() {
        let config = parse("\n[context]\nmatch_count = 3\n").unwrap();
        assert_eq!(config.context.match_count, 3);
        assert_eq!(config.context.recent_count, 10);
        assert!((config.context.similarity_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse("\n[context]\nmatch_count = 0\n").is_err());
        assert!(parse("\n[context]\nsimilarity_threshold = 1.5\n").is_err());
        assert!(parse("\n[indexing]\nconcurrency = 0\n").is_err());
        assert!(parse("\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("\n[embedding]\nprovider = \"bogus\"\n").is_err());
        assert!(parse("\n[completion]\nprovider = \"openai\"\n").is_err());
    }

    #[test]
    fn test_enabled_embedding() {
        let config = parse(
            "\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        )
        .unwrap();
        assert!(config.embedding.is_enabled());
        assert_eq!(config.embedding.dims, Some(768));
    }
}
