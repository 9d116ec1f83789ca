//! Installation lifecycle management for trove.
//!
//! This crate owns the `Installation` state machine: downloads becoming
//! installable files, files becoming OS install sessions, and the
//! cleanup of superseded artifacts. The two installer strategies
//! (streaming into a session vs. copying a finished file) both sit on
//! top of the `PackageSessionPort` defined in `trove-core`.
//!
//! Every state transition is linearized per row and validated against
//! the expected prior status; racing OS callbacks land as defined,
//! logged no-ops instead of corrupting state.

pub mod coordinator;
pub mod dirs;
pub mod installer;

pub use coordinator::{CoordinatorError, DownloadRequest, InstallCoordinator, InstallOutcome};
pub use dirs::InstallDirs;
pub use installer::{FileInstaller, InstallerControl, StreamInstaller};
