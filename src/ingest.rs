//! Ingestion pipeline orchestration.
//!
//! Drives the clustering engine over all entries of one feed, in feed
//! order. Per-entry failures (no thesis, embedding failure, storage
//! hiccup) are isolated: the entry is logged and counted as skipped, and
//! the batch continues. Only a malformed feed aborts the whole call.
//!
//! Each call hydrates its own theme index from storage, so a later entry
//! in the batch can attach to a theme created by an earlier one, while
//! concurrent calls on other feeds see only themes committed before they
//! started.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::ClusteringEngine;
use crate::config::{ClusteringConfig, Config};
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::PipelineError;
use crate::feed;
use crate::matcher::ThemeIndex;
use crate::migrate;
use crate::models::{Document, FeedEntry, IngestSummary};
use crate::store;

enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Fetch one feed and process its entries. The feed fetch/parse is the
/// only fatal step; everything after is per-entry.
pub async fn ingest_feed(
    config: &Config,
    pool: &SqlitePool,
    embedder: Arc<dyn Embedder>,
    feed_url: &str,
) -> Result<IngestSummary, PipelineError> {
    info!(feed_url, "processing feed");
    let entries = feed::fetch_feed(&config.feed, feed_url).await?;
    process_entries(&config.clustering, pool, embedder, entries).await
}

/// Process already-normalized entries against storage and the clustering
/// engine. Split out from [`ingest_feed`] so the pipeline can be driven
/// without a network fetch.
pub async fn process_entries(
    clustering: &ClusteringConfig,
    pool: &SqlitePool,
    embedder: Arc<dyn Embedder>,
    entries: Vec<FeedEntry>,
) -> Result<IngestSummary, PipelineError> {
    let start = Instant::now();
    let engine = ClusteringEngine::new(embedder, clustering);

    let reps = store::list_theme_representatives(pool)
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;
    let mut index = ThemeIndex::from_representatives(reps);

    let mut summary = IngestSummary::default();

    for entry in &entries {
        if entry.external_id.is_empty() {
            warn!(title = %entry.title, "skipping entry without link or id");
            summary.skipped += 1;
            continue;
        }

        let body = match entry.resolve_body() {
            Some(body) => body.to_string(),
            None => {
                warn!(external_id = %entry.external_id, "skipping entry with no usable body");
                summary.skipped += 1;
                continue;
            }
        };

        match process_entry(&engine, pool, &mut index, entry, &body).await {
            Ok(Outcome::Created) => summary.created += 1,
            Ok(Outcome::Updated) => summary.updated += 1,
            Ok(Outcome::Unchanged) => summary.skipped += 1,
            Err(e) => {
                warn!(external_id = %entry.external_id, error = %e, "skipping entry");
                summary.skipped += 1;
            }
        }
    }

    summary.elapsed_seconds = start.elapsed().as_secs_f64();
    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "feed processed"
    );
    Ok(summary)
}

async fn process_entry(
    engine: &ClusteringEngine,
    pool: &SqlitePool,
    index: &mut ThemeIndex,
    entry: &FeedEntry,
    body: &str,
) -> Result<Outcome, PipelineError> {
    let content_hash = content_hash(&entry.title, body);

    let existing = store::get_document_by_url(pool, &entry.external_id)
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

    match existing {
        None => {
            let theme_id = engine.assign(pool, index, body).await?;
            let document = Document {
                id: Uuid::new_v4().to_string(),
                url: entry.external_id.clone(),
                title: entry.title.clone(),
                body: body.to_string(),
                published_at: entry.published_at,
                ingested_at: chrono::Utc::now().timestamp(),
                theme_id: Some(theme_id),
                content_hash,
            };
            store::insert_document(pool, &document)
                .await
                .map_err(|e| PipelineError::Storage(e.to_string()))?;
            Ok(Outcome::Created)
        }
        Some(existing) => {
            if existing.content_hash == content_hash {
                return Ok(Outcome::Unchanged);
            }

            // Content changed: the document may move to another theme.
            // The old theme is left as-is, even if this was its last
            // document.
            let theme_id = engine.reassign(pool, index, body).await?;
            store::update_document(
                pool,
                &existing.id,
                &entry.title,
                body,
                entry.published_at,
                theme_id,
                &content_hash,
            )
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
            Ok(Outcome::Updated)
        }
    }
}

fn content_hash(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// CLI entry point: connect, ensure schema, preload the model, ingest,
/// print the summary.
pub async fn run(config: &Config, feed_url: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let embedder = embedding::create_embedder(&config.embedding)?;
    embedder.preload().await?;

    let summary = ingest_feed(config, &pool, embedder, feed_url).await?;

    println!("ingest {}", feed_url);
    println!("  created: {}", summary.created);
    println!("  updated: {}", summary.updated);
    println!("  skipped: {}", summary.skipped);
    println!("  elapsed: {:.2}s", summary.elapsed_seconds);
    println!("ok");

    pool.close().await;
    Ok(())
}
