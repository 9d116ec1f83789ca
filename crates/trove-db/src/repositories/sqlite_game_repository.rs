//! `SQLite` implementation of the `GameRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use trove_core::{DownloadPageInfo, GameRecord, GameRepository, Locale, RepositoryError};

use super::{map_column_error, map_query_error};

/// `SQLite` implementation of the `GameRepository` trait.
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    /// Create a new `SQLite` game repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn upsert(&self, game: &GameRecord) -> Result<(), RepositoryError> {
        let download_page = game
            .download_page
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO games (
                game_id, name, author_name, store_url, download_page,
                thumbnail_url, last_updated_timestamp, locale, stored_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(game_id) DO UPDATE SET
                name = excluded.name,
                author_name = excluded.author_name,
                store_url = excluded.store_url,
                download_page = excluded.download_page,
                thumbnail_url = excluded.thumbnail_url,
                last_updated_timestamp = excluded.last_updated_timestamp,
                locale = excluded.locale,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(game.game_id)
        .bind(&game.name)
        .bind(&game.author_name)
        .bind(&game.store_url)
        .bind(&download_page)
        .bind(&game.thumbnail_url)
        .bind(&game.last_updated_timestamp)
        .bind(game.locale.tag())
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(())
    }

    async fn get(&self, game_id: i64) -> Result<Option<GameRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT game_id, name, author_name, store_url, download_page,
                   thumbnail_url, last_updated_timestamp, locale
            FROM games WHERE game_id = ?
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.as_ref().map(row_to_game).transpose()
    }

    async fn list(&self) -> Result<Vec<GameRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, name, author_name, store_url, download_page,
                   thumbnail_url, last_updated_timestamp, locale
            FROM games ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.iter().map(row_to_game).collect()
    }
}

/// Convert a database row to a `GameRecord`.
fn row_to_game(row: &sqlx::sqlite::SqliteRow) -> Result<GameRecord, RepositoryError> {
    let game_id: i64 = row.try_get("game_id").map_err(map_column_error)?;
    let name: String = row.try_get("name").map_err(map_column_error)?;
    let author_name: String = row.try_get("author_name").map_err(map_column_error)?;
    let store_url: String = row.try_get("store_url").map_err(map_column_error)?;
    let download_page_json: Option<String> =
        row.try_get("download_page").map_err(map_column_error)?;
    let thumbnail_url: Option<String> = row.try_get("thumbnail_url").map_err(map_column_error)?;
    let last_updated_timestamp: Option<String> = row
        .try_get("last_updated_timestamp")
        .map_err(map_column_error)?;
    let locale_tag: Option<String> = row.try_get("locale").map_err(map_column_error)?;

    let download_page: Option<DownloadPageInfo> =
        download_page_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(GameRecord {
        game_id,
        name,
        author_name,
        store_url,
        download_page,
        thumbnail_url,
        last_updated_timestamp,
        locale: Locale::from_tag(locale_tag),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteGameRepository::new(pool);

        let game = GameRecord::new(17, "Spelunking", "cave-dev", "https://cave-dev.itch.io/spel")
            .with_locale("en")
            .with_last_updated("12 March 2024");
        repo.upsert(&game).await.unwrap();

        let fetched = repo.get(17).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Spelunking");
        assert_eq!(fetched.locale, Locale::Tag("en".to_string()));
        assert_eq!(fetched.last_updated_timestamp.as_deref(), Some("12 March 2024"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteGameRepository::new(pool);

        let game = GameRecord::new(17, "Old Name", "dev", "https://dev.itch.io/g");
        repo.upsert(&game).await.unwrap();

        let renamed = GameRecord::new(17, "New Name", "dev", "https://dev.itch.io/g")
            .with_download_page(
                DownloadPageInfo::new("https://dev.itch.io/g")
                    .with_permanent(true)
                    .with_store_page(true)
                    .with_free(true),
            );
        repo.upsert(&renamed).await.unwrap();

        let fetched = repo.get(17).await.unwrap().unwrap();
        assert_eq!(fetched.name, "New Name");
        assert!(fetched.download_page.unwrap().is_permanent);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteGameRepository::new(pool);
        assert!(repo.get(404).await.unwrap().is_none());
    }
}
