//! Update-check results and download-page descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::upload::UploadCandidate;

/// Where a game's downloads can be fetched from, and how durable that is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPageInfo {
    /// The page URL. May be a temporary signed URL for donation-gated games.
    pub url: String,
    /// Whether the URL stays valid indefinitely. Temporary signed URLs
    /// must be re-resolved before resuming a download later.
    pub is_permanent: bool,
    /// Whether the store page itself doubles as the download page
    /// (free games with a direct download button).
    pub is_store_page: bool,
    /// Whether the game can be downloaded without payment.
    pub is_free: bool,
}

impl DownloadPageInfo {
    /// Create a descriptor with all durability flags off.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_permanent: false,
            is_store_page: false,
            is_free: false,
        }
    }

    /// Set the permanence flag.
    #[must_use]
    pub const fn with_permanent(mut self, permanent: bool) -> Self {
        self.is_permanent = permanent;
        self
    }

    /// Set the store-page flag.
    #[must_use]
    pub const fn with_store_page(mut self, store_page: bool) -> Self {
        self.is_store_page = store_page;
        self
    }

    /// Set the free flag.
    #[must_use]
    pub const fn with_free(mut self, free: bool) -> Self {
        self.is_free = free;
        self
    }
}

/// Terminal verdict of one update check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCheckCode {
    /// The installed upload is current.
    UpToDate,
    /// The page demands payment or login before showing downloads.
    AccessDenied,
    /// A newer build appears to be available.
    UpdateAvailable,
    /// The page yielded no candidates at all.
    Empty,
    /// The check failed; see `error_report`.
    Error,
    /// No verdict could be reached.
    Unknown,
}

impl UpdateCheckCode {
    /// String form for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UpToDate => "up_to_date",
            Self::AccessDenied => "access_denied",
            Self::UpdateAvailable => "update_available",
            Self::Empty => "empty",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from the stored string form. Unrecognized values collapse to
    /// `Unknown` so schema drift degrades instead of failing.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "up_to_date" => Self::UpToDate,
            "access_denied" => Self::AccessDenied,
            "update_available" => Self::UpdateAvailable,
            "empty" => Self::Empty,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Whether the user should be notified about this verdict.
    ///
    /// Up-to-date is silent; every other terminal code produces exactly
    /// one notification per installation.
    #[must_use]
    pub const fn is_notifiable(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Output of one decision-engine invocation for one installation.
///
/// Persisted keyed by `installation_id` and overwritten on every check;
/// this is a latest-state record, not an append-only history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckResult {
    /// The installation this verdict is about.
    pub installation_id: i64,
    /// The verdict.
    pub code: UpdateCheckCode,
    /// Suggested upload to download. `None` with `UpdateAvailable` means
    /// "an update likely exists but which upload is ambiguous" and the UI
    /// should send the user to the store page instead of guessing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<i64>,
    /// Where to resume the download later, with durability flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_page: Option<DownloadPageInfo>,
    /// Preview: name of the suggested upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_upload_name: Option<String>,
    /// Preview: version tag of the suggested upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    /// Preview: rendered size of the suggested upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_size: Option<String>,
    /// Preview: build date string of the suggested upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_timestamp: Option<String>,
    /// Serialized diagnostic, only when `code` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_report: Option<String>,
    /// UI-coordination flag: a download/install for this result is running.
    pub is_installing: bool,
    /// When this check ran.
    pub checked_at: DateTime<Utc>,
}

impl UpdateCheckResult {
    fn bare(installation_id: i64, code: UpdateCheckCode) -> Self {
        Self {
            installation_id,
            code,
            upload_id: None,
            download_page: None,
            new_upload_name: None,
            new_version: None,
            new_size: None,
            new_timestamp: None,
            error_report: None,
            is_installing: false,
            checked_at: Utc::now(),
        }
    }

    /// The installed upload is current.
    #[must_use]
    pub fn up_to_date(installation_id: i64) -> Self {
        Self::bare(installation_id, UpdateCheckCode::UpToDate)
    }

    /// A newer build is available. With a concrete suggestion the preview
    /// fields are denormalized from it; without one the result carries no
    /// upload and the UI must fall back to the store page.
    #[must_use]
    pub fn update_available(installation_id: i64, suggested: Option<&UploadCandidate>) -> Self {
        let mut result = Self::bare(installation_id, UpdateCheckCode::UpdateAvailable);
        if let Some(candidate) = suggested {
            result.upload_id = candidate.upload_id;
            result.new_upload_name = Some(candidate.name.clone());
            result.new_version = candidate.version.clone();
            result.new_size = candidate.file_size.clone();
            result.new_timestamp = candidate.upload_timestamp.clone();
        }
        result
    }

    /// The page yielded no candidates.
    #[must_use]
    pub fn empty(installation_id: i64) -> Self {
        Self::bare(installation_id, UpdateCheckCode::Empty)
    }

    /// The page demands payment or login.
    #[must_use]
    pub fn access_denied(installation_id: i64) -> Self {
        Self::bare(installation_id, UpdateCheckCode::AccessDenied)
    }

    /// The check failed with a diagnostic.
    #[must_use]
    pub fn error(installation_id: i64, report: impl Into<String>) -> Self {
        let mut result = Self::bare(installation_id, UpdateCheckCode::Error);
        result.error_report = Some(report.into());
        result
    }

    /// Attach the download page the check resolved.
    #[must_use]
    pub fn with_download_page(mut self, page: DownloadPageInfo) -> Self {
        self.download_page = Some(page);
        self
    }
}
