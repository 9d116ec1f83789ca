//! The installation lifecycle coordinator.
//!
//! Owns every `Installation` transition:
//!
//! ```text
//! (none) --request_download--> Downloading
//! Downloading --complete, installable--> ReadyToInstall
//! Downloading --complete, plain file--> Installed  (+ cleanup)
//! Downloading --failed--> (deleted)
//! ReadyToInstall --begin_install--> Installing
//! Downloading --begin_streaming_install--> Installing
//! Installing --result: success--> Installed  (+ cleanup)
//! Installing --result: failure--> (deleted)
//! any non-terminal --cancel_pending--> (deleted, OS resource aborted)
//! ```
//!
//! Mutation arrives from three directions at once (OS callbacks, user
//! cancellation, cleanup), so every transition takes a per-row async
//! lock and validates the expected prior status. Duplicate or stale
//! callbacks land as `MissingRow`/`StatusMismatch` outcomes, logged and
//! ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use trove_core::{
    CheckResultRepository, DownloadSpec, DownloaderPort, FetchError, InstallEvent,
    InstallEventEmitter, InstallStatus, Installation, InstallationRepository, InstallerError,
    PackageSessionPort, Repos, RepositoryError, SessionRef, SessionUpdate, TransitionOutcome,
    UNSET_ID,
};

use crate::dirs::InstallDirs;
use crate::installer::{FileInstaller, InstallerControl, StreamInstaller};

/// Error type for lifecycle operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Persistence failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The download orchestrator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The installer failed.
    #[error(transparent)]
    Installer(#[from] InstallerError),

    /// The operation does not apply to the row's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Everything needed to start (or resume) one download.
///
/// This value doubles as the pending-request token for the permission
/// flow: when the OS asks for an install permission mid-request, the
/// caller holds on to this struct and resumes it after the grant. No
/// global "last download" state exists anywhere.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// The unpersisted installation row to create.
    pub installation: Installation,
    /// The resolved (possibly temporary) download URL.
    pub url: String,
    /// MIME type from the metadata fetch, if known.
    pub mime_type: Option<String>,
    /// Expected byte length, if known.
    pub expected_size: Option<u64>,
}

impl DownloadRequest {
    /// Create a request with the required fields.
    pub fn new(installation: Installation, url: impl Into<String>) -> Self {
        Self {
            installation,
            url: url.into(),
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

/// Terminal verdict delivered by the OS for one install session.
///
/// Arrives from the shell's broadcast receiver, so it is serializable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallOutcome {
    /// The package was installed.
    Success {
        /// Package name resolved by the OS.
        package_name: Option<String>,
    },
    /// The install failed. Failed installs are not retried; the user
    /// must re-trigger.
    Failed {
        /// OS-reported failure description.
        reason: String,
    },
}

/// Drives the installation state machine.
pub struct InstallCoordinator {
    repos: Repos,
    downloader: Arc<dyn DownloaderPort>,
    stream_installer: StreamInstaller,
    file_installer: FileInstaller,
    emitter: Arc<dyn InstallEventEmitter>,
    dirs: InstallDirs,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl InstallCoordinator {
    /// Create a coordinator over the given collaborators.
    pub fn new(
        repos: Repos,
        downloader: Arc<dyn DownloaderPort>,
        sessions: Arc<dyn PackageSessionPort>,
        emitter: Arc<dyn InstallEventEmitter>,
        dirs: InstallDirs,
    ) -> Self {
        Self {
            repos,
            downloader,
            stream_installer: StreamInstaller::new(Arc::clone(&sessions)),
            file_installer: FileInstaller::new(sessions),
            emitter,
            dirs,
            row_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize all transitions for one row.
    async fn lock_row(&self, internal_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.row_locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(internal_id)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    fn drop_row_lock(&self, internal_id: i64) {
        self.row_locks.lock().unwrap().remove(&internal_id);
    }

    /// Start a download for a not-yet-persisted installation.
    ///
    /// Enforces the at-most-one-pending invariant by cancelling any
    /// existing non-terminal row for the same upload first. The new row
    /// is persisted only after the downloader confirms enqueueing, so a
    /// failed enqueue leaves nothing behind.
    ///
    /// Returns the assigned installation ID.
    pub async fn request_download(&self, request: DownloadRequest) -> Result<i64, CoordinatorError> {
        let mut installation = request.installation;
        if installation.internal_id != UNSET_ID {
            return Err(CoordinatorError::InvalidState(format!(
                "request_download needs an unpersisted row, got id {}",
                installation.internal_id
            )));
        }

        if let Some(upload_id) = installation.upload_id {
            let pending = self
                .repos
                .installations
                .find_pending_for_upload(upload_id)
                .await?;
            for row in pending {
                debug!(
                    installation = row.internal_id,
                    upload = upload_id,
                    "cancelling superseded pending row before new download"
                );
                if let Err(e) = self.cancel_pending(row.internal_id).await {
                    warn!(
                        installation = row.internal_id,
                        error = %e,
                        "could not cancel pending row; continuing"
                    );
                }
            }
        }

        let mut spec = DownloadSpec::new(
            &request.url,
            self.dirs
                .artifact_path(installation.game_id, &installation.upload_name),
            &installation.upload_name,
        );
        if let Some(mime) = &request.mime_type {
            spec = spec.with_mime_type(mime.clone());
        }
        if let Some(size) = request.expected_size {
            spec = spec.with_expected_size(size);
        }

        // Enqueue first: the row exists only once the OS owns a download
        let download_id = self.downloader.enqueue(&spec).await?;

        installation.session = Some(SessionRef::Download(download_id));
        installation.status = InstallStatus::Downloading;

        let internal_id = match self.repos.installations.insert(&installation).await {
            Ok(id) => id,
            Err(e) => {
                // Roll the orphaned OS download back, best effort
                if let Err(cancel_err) = self.downloader.cancel(download_id).await {
                    warn!(download = download_id, error = %cancel_err,
                        "could not cancel orphaned download");
                }
                return Err(e.into());
            }
        };

        self.emitter.emit(InstallEvent::DownloadStarted {
            installation_id: internal_id,
            game_id: installation.game_id,
        });
        Ok(internal_id)
    }

    /// Persist a row for a download this process fetches itself (the
    /// streaming-install path), with no download-manager entry.
    ///
    /// The same at-most-one-pending rule as `request_download` applies.
    /// Returns the assigned installation ID; follow up with
    /// `begin_streaming_install` once the response body is open.
    pub async fn register_streaming(
        &self,
        installation: Installation,
    ) -> Result<i64, CoordinatorError> {
        let mut installation = installation;
        if installation.internal_id != UNSET_ID {
            return Err(CoordinatorError::InvalidState(format!(
                "register_streaming needs an unpersisted row, got id {}",
                installation.internal_id
            )));
        }

        if let Some(upload_id) = installation.upload_id {
            let pending = self
                .repos
                .installations
                .find_pending_for_upload(upload_id)
                .await?;
            for row in pending {
                if let Err(e) = self.cancel_pending(row.internal_id).await {
                    warn!(
                        installation = row.internal_id,
                        error = %e,
                        "could not cancel pending row; continuing"
                    );
                }
            }
        }

        installation.session = None;
        installation.status = InstallStatus::Downloading;
        let internal_id = self.repos.installations.insert(&installation).await?;

        self.emitter.emit(InstallEvent::DownloadStarted {
            installation_id: internal_id,
            game_id: installation.game_id,
        });
        Ok(internal_id)
    }

    /// React to a finished download.
    ///
    /// An installable package waits for an install trigger; anything
    /// else (a plain zip, a soundtrack) is already in its final place
    /// and the row goes straight to `Installed`.
    pub async fn on_download_complete(
        &self,
        download_id: i64,
        is_installable: bool,
    ) -> Result<TransitionOutcome, CoordinatorError> {
        let Some(row) = self
            .repos
            .installations
            .find_by_session(SessionRef::Download(download_id))
            .await?
        else {
            debug!(download = download_id, "completion for unknown download");
            return Ok(TransitionOutcome::MissingRow);
        };

        let _guard = self.lock_row(row.internal_id).await;

        let next = if is_installable {
            InstallStatus::ReadyToInstall
        } else {
            InstallStatus::Installed
        };
        let outcome = self
            .repos
            .installations
            .transition(
                row.internal_id,
                InstallStatus::Downloading,
                next,
                SessionUpdate::Clear,
            )
            .await?;

        if !outcome.applied() {
            debug!(
                installation = row.internal_id,
                ?outcome,
                "download completion raced another transition"
            );
            return Ok(outcome);
        }

        if is_installable {
            self.emitter.emit(InstallEvent::ReadyToInstall {
                installation_id: row.internal_id,
            });
        } else {
            // Direct-file case: terminal now, so superseded siblings go
            self.cleanup_superseded(&row).await;
            self.emitter.emit(InstallEvent::Installed {
                installation_id: row.internal_id,
                package_name: None,
            });
        }
        Ok(outcome)
    }

    /// React to a failed download: the pending row is deleted. A
    /// missing row is not an error; the user may have cancelled already.
    pub async fn on_download_failed(
        &self,
        download_id: i64,
    ) -> Result<TransitionOutcome, CoordinatorError> {
        let Some(row) = self
            .repos
            .installations
            .find_by_session(SessionRef::Download(download_id))
            .await?
        else {
            debug!(download = download_id, "failure for unknown download");
            return Ok(TransitionOutcome::MissingRow);
        };

        let _guard = self.lock_row(row.internal_id).await;
        self.delete_row(&row).await?;
        self.emitter.emit(InstallEvent::DownloadFailed {
            installation_id: row.internal_id,
        });
        Ok(TransitionOutcome::Applied)
    }

    /// Install a downloaded file through an OS session.
    ///
    /// The session ID is recorded on the row (and the row flipped to
    /// `Installing`) BEFORE the session commits, so even an immediate
    /// OS callback finds the row in place.
    ///
    /// On any install failure the row is deleted; failed installs are
    /// not retried automatically.
    pub async fn begin_install(&self, installation_id: i64) -> Result<i32, CoordinatorError> {
        let guard = self.lock_row(installation_id).await;

        let row = self.require_row(installation_id).await?;
        if row.status != InstallStatus::ReadyToInstall {
            return Err(CoordinatorError::InvalidState(format!(
                "installation {installation_id} is {:?}, not ready to install",
                row.status
            )));
        }

        let path = self.dirs.artifact_for(&row).ok_or_else(|| {
            CoordinatorError::InvalidState(format!(
                "installation {installation_id} has a relocated file; re-request the download"
            ))
        })?;

        let session_id = self.file_installer.open_session_for(&path).await?;
        let outcome = self
            .repos
            .installations
            .transition(
                installation_id,
                InstallStatus::ReadyToInstall,
                InstallStatus::Installing,
                SessionUpdate::Set(SessionRef::Install(session_id)),
            )
            .await?;
        if !outcome.applied() {
            // Someone else moved the row while we opened the session
            let _ = self.file_installer.try_cancel(session_id).await;
            return Err(CoordinatorError::InvalidState(format!(
                "installation {installation_id} changed state during session setup ({outcome:?})"
            )));
        }
        self.emitter.emit(InstallEvent::InstallStarted {
            installation_id,
        });

        drop(guard);
        if let Err(e) = self.file_installer.copy_and_commit(session_id, &path).await {
            // The session is already abandoned; fold the row like any
            // other install failure
            self.on_install_result(
                session_id,
                InstallOutcome::Failed {
                    reason: e.to_string(),
                },
            )
            .await?;
            return Err(e.into());
        }

        Ok(session_id)
    }

    /// Install by piping a network payload straight into a session.
    ///
    /// Stream installs skip the download manager entirely, so the row
    /// transitions `Downloading -> Installing` with no intermediate
    /// ready state.
    pub async fn begin_streaming_install<R>(
        &self,
        installation_id: i64,
        source: R,
        expected_size: Option<u64>,
    ) -> Result<i32, CoordinatorError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let guard = self.lock_row(installation_id).await;

        let row = self.require_row(installation_id).await?;
        if row.status != InstallStatus::Downloading {
            return Err(CoordinatorError::InvalidState(format!(
                "installation {installation_id} is {:?}, not streaming a download",
                row.status
            )));
        }

        let session_id = self.stream_installer.open_session(expected_size).await?;
        let outcome = self
            .repos
            .installations
            .transition(
                installation_id,
                InstallStatus::Downloading,
                InstallStatus::Installing,
                SessionUpdate::Set(SessionRef::Install(session_id)),
            )
            .await?;
        if !outcome.applied() {
            let _ = self.stream_installer.try_cancel(session_id).await;
            return Err(CoordinatorError::InvalidState(format!(
                "installation {installation_id} changed state during session setup ({outcome:?})"
            )));
        }
        self.emitter.emit(InstallEvent::InstallStarted {
            installation_id,
        });

        drop(guard);
        if let Err(e) = self
            .stream_installer
            .stream_and_commit(session_id, source)
            .await
        {
            self.on_install_result(
                session_id,
                InstallOutcome::Failed {
                    reason: e.to_string(),
                },
            )
            .await?;
            return Err(e.into());
        }

        Ok(session_id)
    }

    /// React to the OS verdict for an install session.
    ///
    /// Success finalizes the row (`Installed`, package name recorded,
    /// session cleared) and garbage-collects superseded sibling
    /// installs. Failure deletes the row. Duplicate broadcasts find no
    /// row in `Installing` and land as benign no-ops.
    pub async fn on_install_result(
        &self,
        session_id: i32,
        outcome: InstallOutcome,
    ) -> Result<TransitionOutcome, CoordinatorError> {
        let Some(row) = self
            .repos
            .installations
            .find_by_session(SessionRef::Install(session_id))
            .await?
        else {
            debug!(session = session_id, "install result for unknown session");
            return Ok(TransitionOutcome::MissingRow);
        };

        let _guard = self.lock_row(row.internal_id).await;

        // Re-read under the lock; the row may have moved
        let Some(mut current) = self.repos.installations.get(row.internal_id).await? else {
            return Ok(TransitionOutcome::MissingRow);
        };
        if current.status != InstallStatus::Installing {
            debug!(
                installation = current.internal_id,
                status = ?current.status,
                "install result raced another transition"
            );
            return Ok(TransitionOutcome::StatusMismatch);
        }

        match outcome {
            InstallOutcome::Success { package_name } => {
                current.status = InstallStatus::Installed;
                current.session = None;
                current.package_name = package_name.clone();
                self.repos.installations.update(&current).await?;

                info!(
                    installation = current.internal_id,
                    package = package_name.as_deref().unwrap_or("<unknown>"),
                    "install finished"
                );
                self.cleanup_superseded(&current).await;
                self.emitter.emit(InstallEvent::Installed {
                    installation_id: current.internal_id,
                    package_name,
                });
            }
            InstallOutcome::Failed { reason } => {
                warn!(
                    installation = current.internal_id,
                    reason = %reason,
                    "install failed"
                );
                self.delete_row(&current).await?;
                self.emitter.emit(InstallEvent::InstallFailed {
                    installation_id: current.internal_id,
                    reason,
                });
            }
        }
        Ok(TransitionOutcome::Applied)
    }

    /// Cancel a pending installation.
    ///
    /// The underlying OS resource is cancelled first. A download that
    /// cannot be cancelled (already finished) is treated as
    /// inapplicable and the row still goes; a REFUSED install-session
    /// abandon keeps the row, because the OS may still finish that
    /// install and the eventual callback must find its row.
    ///
    /// Returns whether the row was deleted.
    pub async fn cancel_pending(&self, installation_id: i64) -> Result<bool, CoordinatorError> {
        let _guard = self.lock_row(installation_id).await;

        let Some(row) = self.repos.installations.get(installation_id).await? else {
            debug!(installation = installation_id, "cancel for missing row");
            return Ok(false);
        };
        if row.status.is_terminal() {
            return Err(CoordinatorError::InvalidState(format!(
                "installation {installation_id} is finished; delete it instead of cancelling"
            )));
        }

        match row.session {
            Some(SessionRef::Download(download_id)) => {
                // False here means the entry already finished; either
                // way the OS no longer owes us anything
                let cancelled = self.downloader.cancel(download_id).await?;
                debug!(download = download_id, cancelled, "download cancel");
            }
            Some(SessionRef::Install(session_id)) => {
                if !self.stream_installer.try_cancel(session_id).await {
                    warn!(
                        installation = installation_id,
                        session = session_id,
                        "OS refused to abandon install session; keeping row"
                    );
                    return Ok(false);
                }
            }
            // ReadyToInstall holds no OS resource
            None => {}
        }

        self.delete_row(&row).await?;
        self.emitter.emit(InstallEvent::Cancelled {
            installation_id: row.internal_id,
        });
        Ok(true)
    }

    /// Startup recovery: drop rows stranded in `Installing` by an app
    /// restart (including a self-update) whose session the OS reports
    /// as no longer active. An unknown session state keeps the row.
    ///
    /// Returns how many rows were deleted.
    pub async fn recover_interrupted(&self) -> Result<u32, CoordinatorError> {
        let stuck = self
            .repos
            .installations
            .list_by_status(InstallStatus::Installing)
            .await?;

        let mut deleted = 0;
        for row in stuck {
            let _guard = self.lock_row(row.internal_id).await;
            let active = match row.session {
                Some(SessionRef::Install(session_id)) => {
                    self.stream_installer.is_installing(session_id).await
                }
                // Installing without a session: the session id write was
                // lost; the OS cannot be queried, keep the row
                _ => None,
            };

            match active {
                Some(false) => {
                    info!(
                        installation = row.internal_id,
                        "dropping install interrupted by restart"
                    );
                    self.delete_row(&row).await?;
                    self.emitter.emit(InstallEvent::InstallFailed {
                        installation_id: row.internal_id,
                        reason: "install interrupted by restart".to_string(),
                    });
                    deleted += 1;
                }
                Some(true) | None => {
                    debug!(
                        installation = row.internal_id,
                        ?active,
                        "keeping in-flight install"
                    );
                }
            }
        }
        Ok(deleted)
    }

    /// Delete every other finished installation of the same game whose
    /// upload is no longer in this row's `available_upload_ids`
    /// snapshot, along with its on-disk artifact.
    ///
    /// An empty snapshot means the page was never scraped for siblings;
    /// nothing is deleted in that case.
    async fn cleanup_superseded(&self, installed: &Installation) {
        if installed.available_upload_ids.is_empty() {
            return;
        }

        let siblings = match self
            .repos
            .installations
            .list_for_game(installed.game_id)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(game = installed.game_id, error = %e, "cleanup scan failed");
                return;
            }
        };

        for sibling in siblings {
            if sibling.internal_id == installed.internal_id || !sibling.status.is_terminal() {
                continue;
            }
            let superseded = sibling
                .upload_id
                .is_some_and(|id| !installed.available_upload_ids.contains(&id));
            if !superseded {
                continue;
            }

            info!(
                game = installed.game_id,
                installation = sibling.internal_id,
                upload = ?sibling.upload_id,
                "deleting superseded install"
            );
            if let Err(e) = self.delete_row(&sibling).await {
                warn!(
                    installation = sibling.internal_id,
                    error = %e,
                    "could not delete superseded install"
                );
            }
        }
    }

    /// Remove a row, its check verdict, and its on-disk artifact.
    async fn delete_row(&self, row: &Installation) -> Result<(), CoordinatorError> {
        self.dirs.remove_artifact(row).await;
        self.repos.installations.delete(row.internal_id).await?;
        self.repos.checks.delete(row.internal_id).await?;
        self.drop_row_lock(row.internal_id);
        Ok(())
    }

    async fn require_row(&self, installation_id: i64) -> Result<Installation, CoordinatorError> {
        self.repos
            .installations
            .get(installation_id)
            .await?
            .ok_or_else(|| {
                CoordinatorError::Repository(RepositoryError::NotFound(format!(
                    "Installation with ID '{installation_id}'"
                )))
            })
    }
}
