//! Thesis extraction via embedding centrality.
//!
//! A document's thesis is the sentence (or sentences) most similar, on
//! average, to every other sentence in the same document. This is a
//! centrality heuristic over the pairwise cosine-similarity matrix, not
//! linguistic claim extraction: it finds the most *representative*
//! statement, which is what theme matching needs.
//!
//! Selected sentences are always returned in their original document
//! order, and each is an exact (trimmed) substring of the input text.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::{cosine_similarity, Embedder};

/// Selects the most representative sentence(s) of a document.
pub struct ThesisExtractor {
    embedder: Arc<dyn Embedder>,
    max_sentences: usize,
}

impl ThesisExtractor {
    pub fn new(embedder: Arc<dyn Embedder>, max_sentences: usize) -> Self {
        Self {
            embedder,
            max_sentences,
        }
    }

    /// Extract up to `max_sentences` thesis sentences from `text`.
    ///
    /// Returns an empty vector for text with no extractable sentences
    /// (empty, whitespace, or punctuation-only input) — the caller must
    /// skip such documents. A single-sentence document trivially yields
    /// that sentence without an embedding call.
    pub async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let sentences = split_sentences(text);

        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        if sentences.len() == 1 {
            return Ok(sentences);
        }

        // One batch call for all candidates.
        let embeddings = self.embedder.embed(&sentences).await?;

        let scores = centrality_scores(&embeddings);
        let selected = top_k_indices(&scores, self.max_sentences);

        Ok(selected.into_iter().map(|i| sentences[i].clone()).collect())
    }
}

/// Split text into sentence candidates on sentence-terminal punctuation,
/// trimming whitespace and discarding empty fragments.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Centrality score per candidate: the sum of its cosine similarity to
/// every candidate, itself included. Sum and mean rank identically within
/// one document.
fn centrality_scores(embeddings: &[Vec<f32>]) -> Vec<f32> {
    embeddings
        .iter()
        .map(|a| embeddings.iter().map(|b| cosine_similarity(a, b)).sum())
        .collect()
}

/// Indices of the top-k scores, returned in ascending (original) order.
/// Ties prefer the earlier sentence.
fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut selected: Vec<usize> = order.into_iter().take(k).collect();
    selected.sort_unstable();
    selected
}
