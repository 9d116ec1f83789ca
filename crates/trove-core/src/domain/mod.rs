//! Core domain types.
//!
//! Pure data types with no I/O dependencies. Everything here is
//! serializable so it can cross FFI boundaries unchanged.

pub mod check;
pub mod game;
pub mod installation;
pub mod upload;

pub use check::{DownloadPageInfo, UpdateCheckCode, UpdateCheckResult};
pub use game::GameRecord;
pub use installation::{InstallStatus, Installation, SessionRef, TransitionOutcome, UNSET_ID};
pub use upload::{Locale, Platforms, UploadCandidate};
