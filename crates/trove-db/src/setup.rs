//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path;
//! it opens the pool and ensures the schema exists. All schema
//! statements are idempotent.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::Path;

/// Sets up the `SQLite` database connection and ensures the schema exists.
///
/// Creates the database file (and its parent directory) if missing, then
/// creates all tables and indexes.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Sets up an in-memory `SQLite` database for testing.
///
/// Creates a fresh in-memory database with the full production schema.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// Safe to call multiple times as all operations use IF NOT EXISTS.
pub(crate) async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Store listings, keyed by the stable id scraped from the page
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            author_name TEXT NOT NULL,
            store_url TEXT NOT NULL,
            download_page TEXT,
            thumbnail_url TEXT,
            last_updated_timestamp TEXT,
            locale TEXT,
            stored_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Durable installation rows
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS installations (
            internal_id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id INTEGER NOT NULL,
            upload_id INTEGER,
            available_upload_ids TEXT NOT NULL DEFAULT '[]',
            session_kind TEXT,
            session_id INTEGER,
            status TEXT NOT NULL,
            package_name TEXT,
            external_file_uri TEXT,
            upload_name TEXT NOT NULL,
            version TEXT,
            upload_timestamp TEXT,
            file_size TEXT,
            platforms INTEGER NOT NULL DEFAULT 0,
            locale TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_installations_game ON installations(game_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_installations_upload ON installations(upload_id)")
        .execute(pool)
        .await?;

    // Lookup by owning OS resource (download entry / install session)
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_installations_session \
         ON installations(session_kind, session_id)",
    )
    .execute(pool)
    .await?;

    // Latest check verdict per installation, overwritten on every check
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS update_checks (
            installation_id INTEGER PRIMARY KEY NOT NULL,
            code TEXT NOT NULL,
            upload_id INTEGER,
            download_page TEXT,
            new_upload_name TEXT,
            new_version TEXT,
            new_size TEXT,
            new_timestamp TEXT,
            error_report TEXT,
            is_installing INTEGER NOT NULL DEFAULT 0,
            checked_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
