//! Storage operations over SQLite.
//!
//! The rest of the crate talks to persistence exclusively through these
//! functions; nothing else issues SQL. Document `ingested_at` is written
//! once on insert and never touched by updates.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::models::{Document, Theme};

/// Theme with its document count, as listed by the themes endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeSummary {
    pub id: i64,
    pub thesis: String,
    pub document_count: i64,
    pub created_at: String, // ISO8601
}

/// A theme's documents in chronological order.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeTimeline {
    pub theme_id: i64,
    pub thesis: String,
    pub documents: Vec<TimelineDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineDocument {
    pub title: String,
    pub url: String,
    pub published_at: String, // ISO8601
    pub ingested_at: String,  // ISO8601
}

pub async fn get_document_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, url, title, body, published_at, ingested_at, theme_id, content_hash \
         FROM documents WHERE url = ?",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Document {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        body: row.get("body"),
        published_at: row.get("published_at"),
        ingested_at: row.get("ingested_at"),
        theme_id: row.get("theme_id"),
        content_hash: row.get("content_hash"),
    }))
}

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, url, title, body, published_at, ingested_at, theme_id, content_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.url)
    .bind(&doc.title)
    .bind(&doc.body)
    .bind(doc.published_at)
    .bind(doc.ingested_at)
    .bind(doc.theme_id)
    .bind(&doc.content_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a document's mutable fields. `ingested_at` is deliberately
/// absent from the SET list.
pub async fn update_document(
    pool: &SqlitePool,
    id: &str,
    title: &str,
    body: &str,
    published_at: i64,
    theme_id: i64,
    content_hash: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE documents
        SET title = ?, body = ?, published_at = ?, theme_id = ?, content_hash = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(body)
    .bind(published_at)
    .bind(theme_id)
    .bind(content_hash)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_theme(pool: &SqlitePool, thesis: &str) -> Result<Theme> {
    let created_at = chrono::Utc::now().timestamp();

    let result = sqlx::query("INSERT INTO themes (thesis, created_at) VALUES (?, ?)")
        .bind(thesis)
        .bind(created_at)
        .execute(pool)
        .await?;

    Ok(Theme {
        id: result.last_insert_rowid(),
        thesis: thesis.to_string(),
        created_at,
    })
}

pub async fn get_theme(pool: &SqlitePool, id: i64) -> Result<Option<Theme>> {
    let row = sqlx::query("SELECT id, thesis, created_at FROM themes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Theme {
        id: row.get("id"),
        thesis: row.get("thesis"),
        created_at: row.get("created_at"),
    }))
}

/// All `(theme_id, thesis)` pairs in ascending id order, for hydrating the
/// theme index at the start of an ingestion run.
pub async fn list_theme_representatives(pool: &SqlitePool) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query("SELECT id, thesis FROM themes ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("id"), row.get("thesis")))
        .collect())
}

/// Every theme with its current document count, orphans included.
pub async fn list_themes(pool: &SqlitePool) -> Result<Vec<ThemeSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.thesis, t.created_at, COUNT(d.id) AS document_count
        FROM themes t
        LEFT JOIN documents d ON d.theme_id = t.id
        GROUP BY t.id
        ORDER BY t.id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ThemeSummary {
            id: row.get("id"),
            thesis: row.get("thesis"),
            document_count: row.get("document_count"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}

/// A theme's documents sorted ascending by publication time. Returns
/// `None` for an unknown theme id.
pub async fn theme_timeline(pool: &SqlitePool, theme_id: i64) -> Result<Option<ThemeTimeline>> {
    let theme = match get_theme(pool, theme_id).await? {
        Some(theme) => theme,
        None => return Ok(None),
    };

    let rows = sqlx::query(
        r#"
        SELECT title, url, published_at, ingested_at
        FROM documents
        WHERE theme_id = ?
        ORDER BY published_at ASC, url ASC
        "#,
    )
    .bind(theme_id)
    .fetch_all(pool)
    .await?;

    let documents = rows
        .iter()
        .map(|row| TimelineDocument {
            title: row.get("title"),
            url: row.get("url"),
            published_at: format_ts_iso(row.get("published_at")),
            ingested_at: format_ts_iso(row.get("ingested_at")),
        })
        .collect();

    Ok(Some(ThemeTimeline {
        theme_id: theme.id,
        thesis: theme.thesis,
        documents,
    }))
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    async fn pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn doc(url: &str, theme_id: Option<i64>) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: "title".to_string(),
            body: "body".to_string(),
            published_at: 1_700_000_000,
            ingested_at: 1_700_000_100,
            theme_id,
            content_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn theme_ids_are_monotonic() {
        let pool = pool().await;
        let first = create_theme(&pool, "first").await.unwrap();
        let second = create_theme(&pool, "second").await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn document_roundtrip_by_url() {
        let pool = pool().await;
        let theme = create_theme(&pool, "a thesis").await.unwrap();
        let d = doc("https://example.org/a", Some(theme.id));
        insert_document(&pool, &d).await.unwrap();

        let loaded = get_document_by_url(&pool, "https://example.org/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, d.id);
        assert_eq!(loaded.theme_id, Some(theme.id));
        assert!(get_document_by_url(&pool, "https://example.org/other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_url_rejected() {
        let pool = pool().await;
        insert_document(&pool, &doc("https://example.org/a", None))
            .await
            .unwrap();
        assert!(insert_document(&pool, &doc("https://example.org/a", None))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_leaves_ingested_at_alone() {
        let pool = pool().await;
        let theme = create_theme(&pool, "a thesis").await.unwrap();
        let d = doc("https://example.org/a", Some(theme.id));
        insert_document(&pool, &d).await.unwrap();

        update_document(&pool, &d.id, "new title", "new body", 1_800_000_000, theme.id, "h2")
            .await
            .unwrap();

        let loaded = get_document_by_url(&pool, &d.url).await.unwrap().unwrap();
        assert_eq!(loaded.title, "new title");
        assert_eq!(loaded.published_at, 1_800_000_000);
        assert_eq!(loaded.ingested_at, d.ingested_at);
    }

    #[tokio::test]
    async fn list_themes_counts_documents_and_keeps_orphans() {
        let pool = pool().await;
        let populated = create_theme(&pool, "populated").await.unwrap();
        let orphan = create_theme(&pool, "orphan").await.unwrap();
        insert_document(&pool, &doc("https://example.org/a", Some(populated.id)))
            .await
            .unwrap();
        insert_document(&pool, &doc("https://example.org/b", Some(populated.id)))
            .await
            .unwrap();

        let themes = list_themes(&pool).await.unwrap();
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].id, populated.id);
        assert_eq!(themes[0].document_count, 2);
        assert_eq!(themes[1].id, orphan.id);
        assert_eq!(themes[1].document_count, 0);
    }

    #[tokio::test]
    async fn timeline_sorted_by_published_at() {
        let pool = pool().await;
        let theme = create_theme(&pool, "a thesis").await.unwrap();

        let mut late = doc("https://example.org/late", Some(theme.id));
        late.published_at = 1_800_000_000;
        let mut early = doc("https://example.org/early", Some(theme.id));
        early.published_at = 1_600_000_000;
        insert_document(&pool, &late).await.unwrap();
        insert_document(&pool, &early).await.unwrap();

        let timeline = theme_timeline(&pool, theme.id).await.unwrap().unwrap();
        assert_eq!(timeline.documents.len(), 2);
        assert_eq!(timeline.documents[0].url, "https://example.org/early");
        assert_eq!(timeline.documents[1].url, "https://example.org/late");
    }

    #[tokio::test]
    async fn timeline_unknown_theme_is_none() {
        let pool = pool().await;
        assert!(theme_timeline(&pool, 42).await.unwrap().is_none());
    }
}
