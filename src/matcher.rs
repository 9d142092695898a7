//! Theme matching against the live theme index.
//!
//! The [`ThemeIndex`] is the call-scoped cache of every known theme's
//! representative text and embedding. It is hydrated from storage at the
//! start of an ingestion run, grows as the run creates themes, and is
//! dropped when the run ends. Concurrent ingestion calls each hold their
//! own index; a theme created by a sibling call mid-flight is not visible
//! until the next run hydrates.

use anyhow::Result;

use crate::embedding::{cosine_similarity, Embedder};

/// One theme known to the current ingestion run. The embedding starts
/// empty for entries hydrated from storage and is filled lazily, once,
/// on the first comparison.
#[derive(Debug, Clone)]
pub struct ThemeEntry {
    pub id: i64,
    pub thesis: String,
    pub embedding: Option<Vec<f32>>,
}

/// In-memory index of theme representatives, ordered by ascending theme
/// id. The ordering is what makes the equal-similarity tie-break
/// deterministic: the scan only replaces its best candidate on a strictly
/// greater score, so the lowest id wins ties.
#[derive(Debug, Default)]
pub struct ThemeIndex {
    entries: Vec<ThemeEntry>,
}

impl ThemeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from persisted `(theme_id, thesis)` pairs.
    /// Embeddings are left unset until the first comparison needs them.
    pub fn from_representatives(reps: Vec<(i64, String)>) -> Self {
        let mut entries: Vec<ThemeEntry> = reps
            .into_iter()
            .map(|(id, thesis)| ThemeEntry {
                id,
                thesis,
                embedding: None,
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a theme created during this run, with its already-computed
    /// embedding. Ids come from an autoincrement column, so appending
    /// keeps the index ordered.
    pub fn insert(&mut self, id: i64, thesis: String, embedding: Vec<f32>) {
        debug_assert!(self.entries.last().map_or(true, |e| e.id < id));
        self.entries.push(ThemeEntry {
            id,
            thesis,
            embedding: Some(embedding),
        });
    }

    /// Embed every entry that does not yet carry an embedding, in one
    /// batch call. No-op when everything is already cached; an unchanged
    /// theme text is never re-embedded within a run.
    async fn hydrate_embeddings(&mut self, embedder: &dyn Embedder) -> Result<()> {
        let missing: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = missing
            .iter()
            .map(|&i| self.entries[i].thesis.clone())
            .collect();
        let vectors = embedder.embed(&texts).await?;

        for (&i, vector) in missing.iter().zip(vectors) {
            self.entries[i].embedding = Some(vector);
        }

        Ok(())
    }

    /// Find the best-matching theme for an already-embedded thesis.
    ///
    /// Returns `Some((theme_id, similarity))` when the maximum cosine
    /// similarity reaches `threshold` (inclusive `>=`), `None` otherwise.
    /// An empty index matches nothing and embeds nothing.
    pub async fn best_match(
        &mut self,
        embedder: &dyn Embedder,
        thesis_embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<(i64, f32)>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        self.hydrate_embeddings(embedder).await?;

        let mut best: Option<(i64, f32)> = None;
        for entry in &self.entries {
            let embedding = entry
                .embedding
                .as_ref()
                .expect("hydrate_embeddings fills every entry");
            let score = cosine_similarity(thesis_embedding, embedding);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((entry.id, score)),
            }
        }

        Ok(best.filter(|&(_, score)| score >= threshold))
    }
}
