use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Themes first: documents reference them. AUTOINCREMENT keeps theme
    // ids strictly increasing, which the matcher's tie-break relies on.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS themes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            thesis TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            published_at INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL,
            theme_id INTEGER,
            content_hash TEXT NOT NULL,
            UNIQUE(url),
            FOREIGN KEY (theme_id) REFERENCES themes(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_theme_id ON documents(theme_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_published_at ON documents(published_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
