//! Core data models shared across the ingestion and serving layers.

use serde::Serialize;

/// Normalized feed entry produced by the feed connector before the
/// pipeline sees it. `published_at` already carries the fallback-to-now
/// substitution for entries without a usable date.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Stable external identifier: the entry link, falling back to guid/id.
    pub external_id: String,
    pub title: String,
    /// Full content, when the feed provides one.
    pub content: Option<String>,
    /// Summary or description, when the feed provides one.
    pub summary: Option<String>,
    pub published_at: i64,
}

impl FeedEntry {
    /// Resolve the canonical body text by fixed priority: full content,
    /// then summary, then title. Returns `None` when every candidate is
    /// empty after trimming.
    pub fn resolve_body(&self) -> Option<&str> {
        [
            self.content.as_deref(),
            self.summary.as_deref(),
            Some(self.title.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}

/// Document stored in SQLite. `url` is the unique external key;
/// `ingested_at` is set once on first insert and never updated.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub published_at: i64,
    pub ingested_at: i64,
    pub theme_id: Option<i64>,
    pub content_hash: String,
}

/// Theme cluster. The thesis is fixed at creation and never edited.
#[derive(Debug, Clone)]
pub struct Theme {
    pub id: i64,
    pub thesis: String,
    pub created_at: i64,
}

/// Counts returned by one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub elapsed_seconds: f64,
}
