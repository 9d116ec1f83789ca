//! Core domain types, decision heuristics, and port definitions for
//! trove, an itch.io client core: update detection over scraped store
//! pages and the native install lifecycle.
//!
//! This crate is pure domain logic. The database, HTTP, and OS adapters
//! live in sibling crates and plug in through the traits in [`ports`].

pub mod check;
pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use check::{SelfUpdateStrategy, TagVersionComparator, compare_uploads};
pub use domain::{
    DownloadPageInfo, GameRecord, InstallStatus, Installation, Locale, Platforms, SessionRef,
    TransitionOutcome, UNSET_ID, UpdateCheckCode, UpdateCheckResult, UploadCandidate,
};
pub use errors::{FetchError, InstallerError};
pub use events::{CheckEvent, InstallEvent};
pub use ports::{
    CheckEventEmitter, CheckResultRepository, DownloadSpec, DownloaderPort, GameRepository,
    HttpClientPort, HttpResponse, InstallEventEmitter, InstallationRepository, NoopCheckEmitter,
    NoopInstallEmitter, OwnershipRow, PackageSessionPort, PageParser, Repos, RepositoryError,
    SessionUpdate,
};

// Silence unused dev-dependency warnings until we add mock-based tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
