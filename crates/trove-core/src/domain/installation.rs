//! Durable installation records and their lifecycle vocabulary.

use serde::{Deserialize, Serialize};

use super::upload::{Locale, Platforms, UploadCandidate};

/// Sentinel for an installation row that has not been persisted yet.
pub const UNSET_ID: i64 = 0;

/// Lifecycle status of an installation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// Bytes are being fetched by the downloader.
    Downloading,
    /// Download finished and the file is an installable package.
    ReadyToInstall,
    /// An OS install session is running.
    Installing,
    /// Terminal: the upload is installed (or, for non-package files,
    /// downloaded to its final location).
    Installed,
    /// Terminal: the game is played in the web view; no native artifact.
    WebCached,
}

impl InstallStatus {
    /// String form for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::ReadyToInstall => "ready_to_install",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::WebCached => "web_cached",
        }
    }

    /// Parse from the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "downloading" => Some(Self::Downloading),
            "ready_to_install" => Some(Self::ReadyToInstall),
            "installing" => Some(Self::Installing),
            "installed" => Some(Self::Installed),
            "web_cached" => Some(Self::WebCached),
            _ => None,
        }
    }

    /// Terminal states are never cancelled and never transition again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed | Self::WebCached)
    }

    /// Pending states count against the at-most-one-pending invariant.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

/// Handle to the OS resource currently driving an installation.
///
/// A row in `Downloading` status is owned by a download-manager entry; a
/// row in `Installing` status by a package-installer session. The tag
/// says which, so no magnitude tricks on a shared integer are needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionRef {
    /// Download-manager entry ID.
    Download(i64),
    /// Package-installer session ID.
    Install(i32),
}

impl SessionRef {
    /// String form of the tag for database storage.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Download(_) => "download",
            Self::Install(_) => "install",
        }
    }

    /// The raw ID widened for storage.
    #[must_use]
    pub const fn raw_id(&self) -> i64 {
        match self {
            Self::Download(id) => *id,
            Self::Install(id) => *id as i64,
        }
    }

    /// Rebuild from the stored (kind, id) pair.
    #[must_use]
    pub fn from_stored(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "download" => Some(Self::Download(id)),
            #[expect(
                clippy::cast_possible_truncation,
                reason = "install session ids are 32-bit OS handles"
            )]
            "install" => Some(Self::Install(id as i32)),
            _ => None,
        }
    }

    /// The download-manager ID, if this is a download ref.
    #[must_use]
    pub const fn download_id(&self) -> Option<i64> {
        match self {
            Self::Download(id) => Some(*id),
            Self::Install(_) => None,
        }
    }

    /// The install-session ID, if this is an install ref.
    #[must_use]
    pub const fn install_id(&self) -> Option<i32> {
        match self {
            Self::Install(id) => Some(*id),
            Self::Download(_) => None,
        }
    }
}

/// Outcome of a guarded status transition.
///
/// Racing callbacks (a duplicate OS broadcast, a cancellation crossing a
/// completion) are expected; the two no-op outcomes make them visible to
/// logging without being errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The row matched the expected status and was updated.
    Applied,
    /// No row with that ID exists (already deleted).
    MissingRow,
    /// The row exists but its status was not the expected one.
    StatusMismatch,
}

impl TransitionOutcome {
    /// Whether the transition took effect.
    #[must_use]
    pub const fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The durable record of a user's relationship to one upload.
///
/// Created when a download is requested; every later mutation goes through
/// the lifecycle coordinator in response to downloader and installer
/// callbacks. At most one pending (non-terminal) row may exist per upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Primary key; [`UNSET_ID`] until the row is persisted.
    pub internal_id: i64,
    /// Game this installation belongs to.
    pub game_id: i64,
    /// Upload this installation tracks, if the page exposed an ID.
    pub upload_id: Option<i64>,
    /// Snapshot of every upload ID offered when this install was taken.
    /// Used to garbage-collect superseded sibling installs.
    pub available_upload_ids: Vec<i64>,
    /// OS resource currently driving this row, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRef>,
    /// Lifecycle status.
    pub status: InstallStatus,
    /// Package name, once APK metadata is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Set if the user relocated the downloaded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_file_uri: Option<String>,
    /// Upload display name at install time.
    pub upload_name: String,
    /// Version tag at install time, for butler builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Build date string at install time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_timestamp: Option<String>,
    /// Rendered file size at install time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    /// Platform set at install time.
    pub platforms: Platforms,
    /// Locale the source page was rendered in.
    pub locale: Locale,
}

impl Installation {
    /// Create an unpersisted installation from a scraped candidate.
    #[must_use]
    pub fn from_candidate(candidate: &UploadCandidate, status: InstallStatus) -> Self {
        Self {
            internal_id: UNSET_ID,
            game_id: candidate.game_id,
            upload_id: candidate.upload_id,
            available_upload_ids: Vec::new(),
            session: None,
            status,
            package_name: None,
            external_file_uri: None,
            upload_name: candidate.name.clone(),
            version: candidate.version.clone(),
            upload_timestamp: candidate.upload_timestamp.clone(),
            file_size: candidate.file_size.clone(),
            platforms: candidate.platforms,
            locale: candidate.locale.clone(),
        }
    }

    /// Set the sibling-upload snapshot.
    #[must_use]
    pub fn with_available_uploads(mut self, ids: Vec<i64>) -> Self {
        self.available_upload_ids = ids;
        self
    }

    /// Whether this row has been persisted.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.internal_id != UNSET_ID
    }

    /// View of this installation as a comparison operand for the
    /// update decision engine.
    #[must_use]
    pub fn as_candidate(&self) -> UploadCandidate {
        UploadCandidate {
            game_id: self.game_id,
            upload_id: self.upload_id,
            name: self.upload_name.clone(),
            version: self.version.clone(),
            upload_timestamp: self.upload_timestamp.clone(),
            file_size: self.file_size.clone(),
            platforms: self.platforms,
            locale: self.locale.clone(),
        }
    }
}
