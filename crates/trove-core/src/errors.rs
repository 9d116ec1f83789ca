//! Error types shared across the workspace.
//!
//! These errors are serializable and do not depend on external error
//! types like `std::io::Error` or `reqwest::Error`; I/O errors are
//! captured as kind and message strings so they can cross FFI
//! boundaries and be stored in a check result's `error_report`.
//!
//! Access-denied and cancellation are first-class outcomes, not errors;
//! `FetchError::Cancelled` only exists so a cancelled batch can unwind
//! cleanly without being reported as a failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for network fetching and URL resolution.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchError {
    /// Network/HTTP failure.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if the server answered at all.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A redirect on an authenticated endpoint: the session cookie is
    /// missing or expired. Distinct from a generic network error so the
    /// UI can prompt for login instead of suggesting a retry.
    #[error("Not logged in")]
    NotLoggedIn,

    /// A page or JSON body that should have been parseable was not.
    #[error("Unparseable response: {message}")]
    Parse {
        /// What failed to parse.
        message: String,
    },

    /// The operation was cancelled. Control flow, not a failure.
    #[error("Fetch cancelled")]
    Cancelled,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl FetchError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with an HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Transient failures that the retry queue may attempt again.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Serialized diagnostic for a persisted `error_report`.
    #[must_use]
    pub fn report(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

/// Error type for package-install operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstallerError {
    /// The OS could not allocate space for the install session.
    /// Distinguished from generic I/O because it is user-actionable.
    #[error("Not enough space to install: {message}")]
    InsufficientStorage {
        /// The underlying allocation-failure message.
        message: String,
    },

    /// Session-level failure (create, commit, abandon).
    #[error("Install session error: {message}")]
    Session {
        /// Detailed error message.
        message: String,
    },

    /// I/O error while writing package bytes.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g. "NotFound", "PermissionDenied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The install was cancelled. Control flow, not a failure.
    #[error("Install cancelled")]
    Cancelled,
}

/// Fragments of allocation-failure messages the OS emits when a session
/// cannot be sized. There is no structured error code for this, only text.
const STORAGE_EXHAUSTION_MARKERS: &[&str] = &[
    "not enough space",
    "no space left",
    "failed to allocate",
    "enospc",
];

impl InstallerError {
    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Capture a `std::io::Error`, promoting allocation failures to
    /// [`InstallerError::InsufficientStorage`].
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let message = err.to_string();
        if Self::looks_like_storage_exhaustion(&message)
            || err.kind() == std::io::ErrorKind::StorageFull
        {
            return Self::InsufficientStorage { message };
        }
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message,
        }
    }

    /// Whether an error message matches a known allocation-failure shape.
    #[must_use]
    pub fn looks_like_storage_exhaustion(message: &str) -> bool {
        let lower = message.to_lowercase();
        STORAGE_EXHAUSTION_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InsufficientStorage { .. } => {
                "Not enough storage space to install. Free some space and try again.".to_string()
            }
            Self::Session { message } => format!("Installation failed: {message}"),
            Self::Io { message, .. } => format!("Installation failed: {message}"),
            Self::Cancelled => "Installation was cancelled.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_fetch_errors() {
        assert!(FetchError::network("reset by peer").is_recoverable());
        assert!(FetchError::Timeout.is_recoverable());
        assert!(!FetchError::NotLoggedIn.is_recoverable());
        assert!(!FetchError::Cancelled.is_recoverable());
        assert!(!FetchError::parse("missing field").is_recoverable());
    }

    #[test]
    fn fetch_error_report_is_json() {
        let err = FetchError::network_with_status("server melted", 503);
        let report = err.report();
        assert!(report.contains("503"));
        let parsed: FetchError = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn storage_exhaustion_is_promoted() {
        let io_err = std::io::Error::other("Failed to allocate 52428800 bytes");
        let err = InstallerError::from_io_error(&io_err);
        assert!(matches!(err, InstallerError::InsufficientStorage { .. }));

        let plain = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = InstallerError::from_io_error(&plain);
        assert!(matches!(err, InstallerError::Io { .. }));
    }

    #[test]
    fn storage_exhaustion_markers() {
        assert!(InstallerError::looks_like_storage_exhaustion(
            "There is not enough space on the device"
        ));
        assert!(InstallerError::looks_like_storage_exhaustion(
            "write failed: ENOSPC (No space left on device)"
        ));
        assert!(!InstallerError::looks_like_storage_exhaustion(
            "permission denied"
        ));
    }
}
