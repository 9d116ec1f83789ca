//! On-disk layout for pending download artifacts.

use std::path::{Path, PathBuf};

use tracing::debug;

use trove_core::Installation;

/// Directory layout for files fetched by the download orchestrator:
/// one subdirectory per game under a single pending root.
#[derive(Clone, Debug)]
pub struct InstallDirs {
    pending_root: PathBuf,
}

impl InstallDirs {
    /// Create a layout rooted at `pending_root`.
    pub fn new(pending_root: impl Into<PathBuf>) -> Self {
        Self {
            pending_root: pending_root.into(),
        }
    }

    /// Where a download for this game/upload lands.
    #[must_use]
    pub fn artifact_path(&self, game_id: i64, upload_name: &str) -> PathBuf {
        self.pending_root
            .join(game_id.to_string())
            .join(sanitize_file_name(upload_name))
    }

    /// The artifact path for a persisted installation row, unless the
    /// user relocated the file.
    #[must_use]
    pub fn artifact_for(&self, installation: &Installation) -> Option<PathBuf> {
        if installation.external_file_uri.is_some() {
            return None;
        }
        Some(self.artifact_path(installation.game_id, &installation.upload_name))
    }

    /// Best-effort removal of a row's on-disk artifact. A missing file
    /// is not an error; a relocated file is never touched.
    pub async fn remove_artifact(&self, installation: &Installation) {
        let Some(path) = self.artifact_for(installation) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed superseded artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %path.display(), error = %e, "could not remove artifact"),
        }
    }
}

/// Flatten anything path-like out of a scraped upload name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim_matches('.').trim();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Read a file's length, for sizing an install session.
pub(crate) async fn file_size(path: &Path) -> std::io::Result<u64> {
    Ok(tokio::fs::metadata(path).await?.len())
}
