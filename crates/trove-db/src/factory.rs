//! Composition utilities for wiring `SQLite` repositories.
//!
//! Construction only; no domain logic.

use sqlx::SqlitePool;
use std::sync::Arc;

use trove_core::Repos;

use crate::repositories::{
    SqliteCheckResultRepository, SqliteGameRepository, SqliteInstallationRepository,
};

/// Factory for creating repository instances with `SQLite` backends.
pub struct CoreFactory;

impl CoreFactory {
    /// Create a `SQLite` connection pool from a URL
    /// (e.g., "sqlite:/data/trove.db").
    pub async fn create_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
        let pool = SqlitePool::connect(db_url).await?;
        Ok(pool)
    }

    /// Build all `SQLite` repositories from a pool.
    ///
    /// This is the recommended way for adapters to obtain repositories:
    /// a `Repos` struct of trait-object-wrapped implementations.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos::new(
            Arc::new(SqliteGameRepository::new(pool.clone())),
            Arc::new(SqliteInstallationRepository::new(pool.clone())),
            Arc::new(SqliteCheckResultRepository::new(pool)),
        )
    }

    /// Create a game repository from a pool.
    pub fn game_repository(pool: SqlitePool) -> Arc<SqliteGameRepository> {
        Arc::new(SqliteGameRepository::new(pool))
    }

    /// Create an installation repository from a pool.
    pub fn installation_repository(pool: SqlitePool) -> Arc<SqliteInstallationRepository> {
        Arc::new(SqliteInstallationRepository::new(pool))
    }

    /// Create a check result repository from a pool.
    pub fn check_repository(pool: SqlitePool) -> Arc<SqliteCheckResultRepository> {
        Arc::new(SqliteCheckResultRepository::new(pool))
    }
}
