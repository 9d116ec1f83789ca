//! `SQLite` repository implementations for trove.
//!
//! Implements the repository ports from `trove-core` on top of sqlx.
//! No domain logic lives here; only row mapping and query plumbing.

pub mod factory;
pub mod repositories;
pub mod setup;

pub use factory::CoreFactory;
pub use repositories::{
    SqliteCheckResultRepository, SqliteGameRepository, SqliteInstallationRepository,
};
pub use setup::setup_database;

#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
