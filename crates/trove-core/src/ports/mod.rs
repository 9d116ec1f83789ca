//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the core domain expects from
//! infrastructure: the relational store, the HTTP layer, the OS download
//! manager and package installer, and the HTML record parser. They
//! contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` or `reqwest` types in any signature
//! - Repositories are intent-based, not generic CRUD
//! - The parser is consumed as pure functions over fetched HTML; its
//!   DOM walking lives entirely behind the trait

pub mod check_repository;
pub mod downloader;
pub mod event_emitter;
pub mod game_repository;
pub mod http_client;
pub mod installation_repository;
pub mod package_session;
pub mod page_parser;

use std::sync::Arc;
use thiserror::Error;

pub use check_repository::CheckResultRepository;
pub use downloader::{DownloadSpec, DownloaderPort};
pub use event_emitter::{
    CheckEventEmitter, InstallEventEmitter, NoopCheckEmitter, NoopInstallEmitter,
};
pub use game_repository::GameRepository;
pub use http_client::{HttpClientPort, HttpResponse};
pub use installation_repository::{InstallationRepository, SessionUpdate};
pub use package_session::PackageSessionPort;
pub use page_parser::{OwnershipRow, PageParser};

/// Domain-specific errors for repository operations.
///
/// Abstracts away storage implementation details; sqlx errors are
/// captured as strings at the adapter boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// Underlying storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or integrity constraint was violated.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Container for all repository trait objects.
///
/// Wires repositories across adapters without coupling them to concrete
/// implementations; lives in core so services can accept it without
/// depending on the database crate.
#[derive(Clone)]
pub struct Repos {
    /// Store-listing records.
    pub games: Arc<dyn GameRepository>,
    /// Durable installation rows.
    pub installations: Arc<dyn InstallationRepository>,
    /// Latest update-check verdicts.
    pub checks: Arc<dyn CheckResultRepository>,
}

impl Repos {
    /// Create a new repository container.
    pub fn new(
        games: Arc<dyn GameRepository>,
        installations: Arc<dyn InstallationRepository>,
        checks: Arc<dyn CheckResultRepository>,
    ) -> Self {
        Self {
            games,
            installations,
            checks,
        }
    }
}
