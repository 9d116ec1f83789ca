//! Download manager port definition.
//!
//! Abstracts the OS download manager (or a resumable downloader).
//! Completion and failure arrive as calls into the lifecycle
//! coordinator from the shell's broadcast receiver; this port only
//! covers what the core initiates.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::FetchError;

/// Everything needed to enqueue one download.
#[derive(Clone, Debug)]
pub struct DownloadSpec {
    /// The (possibly temporary) resolved download URL.
    pub url: String,
    /// Destination path for the fetched file.
    pub destination: PathBuf,
    /// File name to display while downloading.
    pub display_name: String,
    /// MIME type reported by the metadata fetch, if any.
    pub mime_type: Option<String>,
    /// Expected byte length, if the server reported one.
    pub expected_size: Option<u64>,
}

impl DownloadSpec {
    /// Create a spec with the required fields.
    pub fn new(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            display_name: display_name.into(),
            mime_type: None,
            expected_size: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the expected byte length.
    #[must_use]
    pub const fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }
}

/// Port for the OS download manager.
#[async_trait]
pub trait DownloaderPort: Send + Sync {
    /// Enqueue a download and return the manager-assigned ID.
    ///
    /// A returned ID means the download is owned by the OS from here on;
    /// callers persist their bookkeeping only after this succeeds so a
    /// failed enqueue leaves no orphaned row.
    async fn enqueue(&self, spec: &DownloadSpec) -> Result<i64, FetchError>;

    /// Cancel a download. Returns whether an entry was actually
    /// cancelled; an already-finished or unknown ID yields `false`,
    /// never an error.
    async fn cancel(&self, download_id: i64) -> Result<bool, FetchError>;
}
