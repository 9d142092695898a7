//! Incremental clustering engine.
//!
//! Ties the thesis extractor and theme matcher together and owns the
//! mutation of the theme index: a document either attaches to the most
//! similar existing theme or founds a new one. Assignments are strictly
//! incremental — the engine never revisits earlier decisions, never merges
//! themes, and never edits a theme's thesis after creation.

use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ClusteringConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::matcher::ThemeIndex;
use crate::store;
use crate::thesis::ThesisExtractor;

/// Stateless per-document decision procedure over a caller-owned
/// [`ThemeIndex`]. The embedder is injected at construction and shared for
/// the process lifetime; the index is call-scoped.
pub struct ClusteringEngine {
    embedder: Arc<dyn Embedder>,
    extractor: ThesisExtractor,
    similarity_threshold: f32,
}

impl ClusteringEngine {
    pub fn new(embedder: Arc<dyn Embedder>, config: &ClusteringConfig) -> Self {
        let extractor = ThesisExtractor::new(embedder.clone(), config.max_thesis_sentences);
        Self {
            embedder,
            extractor,
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Assign a document's text to a theme.
    ///
    /// Extracts the thesis, matches it against the live index, and either
    /// returns the matched theme id (no mutation) or creates a new theme:
    /// committed to storage first, then inserted into the index with its
    /// embedding cached, so every later document in the same run can match
    /// against it.
    pub async fn assign(
        &self,
        pool: &SqlitePool,
        index: &mut ThemeIndex,
        text: &str,
    ) -> Result<i64, PipelineError> {
        let sentences = self
            .extractor
            .extract(text)
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        if sentences.is_empty() {
            return Err(PipelineError::NoThesisFound);
        }

        let thesis = sentences.join(" ");

        let thesis_embedding = self
            .embedder
            .embed(std::slice::from_ref(&thesis))
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Embedding("empty embedding response".to_string()))?;

        let matched = index
            .best_match(
                self.embedder.as_ref(),
                &thesis_embedding,
                self.similarity_threshold,
            )
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        if let Some((theme_id, score)) = matched {
            debug!(theme_id, score, "thesis matched existing theme");
            return Ok(theme_id);
        }

        let theme = store::create_theme(pool, &thesis)
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        info!(theme_id = theme.id, thesis = %theme.thesis, "created theme");
        index.insert(theme.id, thesis, thesis_embedding);

        Ok(theme.id)
    }

    /// Re-evaluate an updated document against the current index.
    ///
    /// Same decision procedure as [`assign`](Self::assign), run on the new
    /// content: the document may move to another theme or found one. The
    /// old theme keeps its thesis and its other documents; a theme left
    /// with zero documents is kept as an orphan. The caller persists the
    /// document's new theme reference.
    pub async fn reassign(
        &self,
        pool: &SqlitePool,
        index: &mut ThemeIndex,
        new_text: &str,
    ) -> Result<i64, PipelineError> {
        self.assign(pool, index, new_text).await
    }
}
