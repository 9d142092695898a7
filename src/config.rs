use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    /// Minimum cosine similarity for a thesis to join an existing theme.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// How many sentences make up a document's thesis.
    #[serde(default = "default_max_thesis_sentences")]
    pub max_thesis_sentences: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_thesis_sentences: default_max_thesis_sentences(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.8
}
fn default_max_thesis_sentences() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
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

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_feed_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_feed_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    format!("thematic/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.clustering.similarity_threshold) {
        anyhow::bail!("clustering.similarity_threshold must be in [0.0, 1.0]");
    }

    if config.clustering.max_thesis_sentences == 0 {
        anyhow::bail!("clustering.max_thesis_sentences must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "local" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    if config.embedding.provider != "local" {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.feed.timeout_secs == 0 {
        anyhow::bail!("feed.timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("thematic.toml");
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let (_tmp, path) = write_config(
            r#"[db]
path = "data/thematic.sqlite"

[server]
bind = "127.0.0.1:8080"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.clustering.similarity_threshold, 0.8);
        assert_eq!(cfg.clustering.max_thesis_sentences, 1);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.embedding.batch_size, 64);
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let (_tmp, path) = write_config(
            r#"[db]
path = "data/thematic.sqlite"

[clustering]
similarity_threshold = 1.5

[server]
bind = "127.0.0.1:8080"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn zero_thesis_sentences_rejected() {
        let (_tmp, path) = write_config(
            r#"[db]
path = "data/thematic.sqlite"

[clustering]
max_thesis_sentences = 0

[server]
bind = "127.0.0.1:8080"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn remote_provider_requires_model_and_dims() {
        let (_tmp, path) = write_config(
            r#"[db]
path = "data/thematic.sqlite"

[embedding]
provider = "ollama"

[server]
bind = "127.0.0.1:8080"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let (_tmp, path) = write_config(
            r#"[db]
path = "data/thematic.sqlite"

[embedding]
provider = "cohere"

[server]
bind = "127.0.0.1:8080"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
