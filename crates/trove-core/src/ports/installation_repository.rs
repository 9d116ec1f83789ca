//! Installation repository port definition.
//!
//! The installations table is the single source of truth for lifecycle
//! state and is mutated from three directions (OS callbacks, user
//! cancellation, post-install cleanup). Every status change therefore
//! goes through [`InstallationRepository::transition`], a compare-and-set
//! keyed on the expected prior status; unconditional status overwrites
//! are not part of this interface.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{InstallStatus, Installation, SessionRef, TransitionOutcome};

/// How a transition should treat the row's session reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Leave the stored session untouched.
    Keep,
    /// Replace the stored session.
    Set(SessionRef),
    /// Clear the stored session.
    Clear,
}

/// Port for persisting installation rows.
#[async_trait]
pub trait InstallationRepository: Send + Sync {
    /// Insert a new row and return its assigned `internal_id`.
    ///
    /// The installation's own `internal_id` must be the unset sentinel;
    /// an already-persisted row is a caller bug surfaced as
    /// [`RepositoryError::Constraint`].
    async fn insert(&self, installation: &Installation) -> Result<i64, RepositoryError>;

    /// Fetch by primary key.
    async fn get(&self, internal_id: i64) -> Result<Option<Installation>, RepositoryError>;

    /// Find the row currently owned by an OS resource, if any.
    async fn find_by_session(
        &self,
        session: SessionRef,
    ) -> Result<Option<Installation>, RepositoryError>;

    /// All non-terminal rows for one upload. Used to enforce the
    /// at-most-one-pending invariant before a new download starts.
    async fn find_pending_for_upload(
        &self,
        upload_id: i64,
    ) -> Result<Vec<Installation>, RepositoryError>;

    /// All rows for one game.
    async fn list_for_game(&self, game_id: i64) -> Result<Vec<Installation>, RepositoryError>;

    /// All rows in one status, across games.
    async fn list_by_status(
        &self,
        status: InstallStatus,
    ) -> Result<Vec<Installation>, RepositoryError>;

    /// Replace a row's full contents, keyed by `internal_id`.
    async fn update(&self, installation: &Installation) -> Result<(), RepositoryError>;

    /// Guarded status transition: apply `next` (and the session change)
    /// only if the row currently holds `expected`.
    ///
    /// Returns which of the three defined outcomes occurred; callers log
    /// the no-op outcomes and move on.
    async fn transition(
        &self,
        internal_id: i64,
        expected: InstallStatus,
        next: InstallStatus,
        session: SessionUpdate,
    ) -> Result<TransitionOutcome, RepositoryError>;

    /// Delete a row. Returns whether a row existed.
    async fn delete(&self, internal_id: i64) -> Result<bool, RepositoryError>;
}
