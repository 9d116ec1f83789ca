//! Event types - discriminated unions for state changes the UI layer
//! consumes (notifications, list refreshes).

use serde::{Deserialize, Serialize};

use crate::domain::UpdateCheckResult;

/// Events emitted while an update-check batch runs.
///
/// Serialized with a `type` tag so frontends can switch on it directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckEvent {
    /// A batch of checks has started.
    BatchStarted {
        /// Number of installations in the batch.
        total: u32,
    },

    /// One installation's verdict is ready.
    ///
    /// Emitted for every notifiable code; up-to-date verdicts are
    /// persisted but produce no event.
    ResultReady {
        /// The persisted verdict.
        result: UpdateCheckResult,
    },

    /// The batch finished.
    BatchFinished {
        /// Verdicts persisted, including silent up-to-date ones.
        completed: u32,
        /// Installations that ended in an error verdict.
        failed: u32,
        /// Whether the batch was cut short by cancellation.
        cancelled: bool,
    },
}

/// Events emitted by the installation lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    /// A download was enqueued and its row persisted.
    DownloadStarted {
        /// The installation row.
        installation_id: i64,
        /// The game it belongs to.
        game_id: i64,
    },

    /// A download finished and the file awaits an install trigger.
    ReadyToInstall {
        /// The installation row.
        installation_id: i64,
    },

    /// An OS install session was opened.
    InstallStarted {
        /// The installation row.
        installation_id: i64,
    },

    /// The install (or direct-file download) reached its terminal state.
    Installed {
        /// The installation row.
        installation_id: i64,
        /// Resolved package name, when the file was a package.
        #[serde(skip_serializing_if = "Option::is_none")]
        package_name: Option<String>,
    },

    /// A download failed and its row was removed.
    DownloadFailed {
        /// The installation row that was removed.
        installation_id: i64,
    },

    /// An install failed and its row was removed.
    InstallFailed {
        /// The installation row that was removed.
        installation_id: i64,
        /// OS-reported failure description.
        reason: String,
    },

    /// A pending installation was cancelled by the user.
    Cancelled {
        /// The installation row that was removed.
        installation_id: i64,
    },
}
