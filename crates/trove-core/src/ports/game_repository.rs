//! Game record repository port definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::GameRecord;

/// Port for persisting store-listing records.
///
/// Games are upserted on every store-page visit; the cached download
/// page on a record is replaced wholesale by each upsert so a stale
/// permanent URL never outlives the page that carried it.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Insert or replace a game record keyed by `game_id`.
    async fn upsert(&self, game: &GameRecord) -> Result<(), RepositoryError>;

    /// Fetch a game by its stable ID.
    async fn get(&self, game_id: i64) -> Result<Option<GameRecord>, RepositoryError>;

    /// All known games.
    async fn list(&self) -> Result<Vec<GameRecord>, RepositoryError>;
}
