//! `SQLite` implementations of the `trove-core` repository ports.

mod sqlite_check_repository;
mod sqlite_game_repository;
mod sqlite_installation_repository;

pub use sqlite_check_repository::SqliteCheckResultRepository;
pub use sqlite_game_repository::SqliteGameRepository;
pub use sqlite_installation_repository::SqliteInstallationRepository;

use trove_core::RepositoryError;

/// Map a sqlx column-read failure to a repository error.
pub(crate) fn map_column_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(format!("Column read error: {e}"))
}

/// Map a sqlx query failure to a repository error.
pub(crate) fn map_query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}
