//! Shared test fixtures: a deterministic embedder double and in-memory
//! database helpers.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thematic::config::ClusteringConfig;
use thematic::embedding::Embedder;
use thematic::models::FeedEntry;

const DIMS: usize = 128;

/// Deterministic hashed bag-of-words embedder. Texts sharing most of
/// their words land close in cosine space, which is all the clustering
/// semantics need; no model download, no randomness.
pub struct BagEmbedder;

impl BagEmbedder {
    pub fn shared() -> Arc<dyn Embedder> {
        Arc::new(BagEmbedder)
    }
}

#[async_trait]
impl Embedder for BagEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_vector(t)).collect())
    }
}

fn bag_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        v[(hasher.finish() % DIMS as u64) as usize] += 1.0;
    }
    v
}

pub async fn memory_pool() -> SqlitePool {
    let pool = thematic::db::connect_memory().await.unwrap();
    thematic::migrate::run_migrations(&pool).await.unwrap();
    pool
}

/// Bag-of-words vectors for short sentences overlap far less than real
/// model embeddings do, so tests run with a lower threshold than the
/// production default.
pub fn clustering(threshold: f32) -> ClusteringConfig {
    ClusteringConfig {
        similarity_threshold: threshold,
        max_thesis_sentences: 1,
    }
}

pub fn entry(url: &str, title: &str, body: &str) -> FeedEntry {
    FeedEntry {
        external_id: url.to_string(),
        title: title.to_string(),
        content: if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        },
        summary: None,
        published_at: 1_722_852_000,
    }
}
