//! Store fetch orchestration for trove.
//!
//! This crate owns everything that talks to the store over HTTP: the
//! reqwest-backed client, download-URL resolution (purchased, free, and
//! donation-gated flows), and the batched update checker with its
//! round-robin retry queue.
//!
//! The decision heuristics themselves live in `trove-core`; this crate
//! only fetches their inputs and persists their outputs.

pub mod checker;
pub mod config;
pub mod http;
pub mod resolver;

pub use checker::{CheckBatchOutcome, SelfUpdateChannel, UpdateChecker};
pub use config::{CheckConfig, ClientConfig};
pub use http::ReqwestClient;
pub use resolver::{DownloadUrlResolver, FileMetadata, ResolvedAccess};
