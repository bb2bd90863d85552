//! Database initialization
//!
//! Opens (or creates) the SQLite database and ensures the `leads` table exists.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the database at `db_path`, creating file and schema if missing
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    // WAL lets the poll endpoint read while a worker writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_leads_table(&pool).await?;

    Ok(pool)
}

/// Create the `leads` table if it doesn't exist
pub async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'New',
            notes TEXT,
            sentiment TEXT,
            sentiment_score REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (leads)");

    Ok(())
}
