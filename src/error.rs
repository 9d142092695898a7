//! Pipeline error taxonomy.
//!
//! Feed parse failures abort the whole ingest call; everything else is
//! isolated per document and counted as skipped by the pipeline.

/// Errors raised by the clustering and ingestion layers.
#[derive(Debug)]
pub enum PipelineError {
    /// The feed could not be fetched or its XML parsed. Fatal for the call.
    FeedParse(String),
    /// A document yielded no extractable sentence. The document is skipped.
    NoThesisFound,
    /// The embedder failed for one document's texts. The document is skipped.
    Embedding(String),
    /// A storage operation failed for one document.
    Storage(String),
    /// Timeline lookup for an unknown theme id.
    ThemeNotFound(i64),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::FeedParse(e) => write!(f, "invalid feed: {}", e),
            PipelineError::NoThesisFound => write!(f, "no thesis found"),
            PipelineError::Embedding(e) => write!(f, "embedding failed: {}", e),
            PipelineError::Storage(e) => write!(f, "storage error: {}", e),
            PipelineError::ThemeNotFound(id) => write!(f, "theme not found: {}", id),
        }
    }
}

impl std::error::Error for PipelineError {}
