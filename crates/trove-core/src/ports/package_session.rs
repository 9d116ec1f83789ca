//! OS package-installer session port definition.
//!
//! The OS exposes transactional install sessions: create one (optionally
//! sized), stream the package bytes into it, then commit. The final
//! verdict arrives asynchronously through the shell's callback channel
//! and reaches the lifecycle coordinator as `on_install_result`.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::errors::InstallerError;

/// Port for the session-based package installer.
#[async_trait]
pub trait PackageSessionPort: Send + Sync {
    /// Open a new install session, sized to the expected byte length
    /// when known. Sizing up front lets the OS fail fast on exhausted
    /// storage instead of mid-stream.
    async fn create_session(&self, expected_size: Option<u64>) -> Result<i32, InstallerError>;

    /// Open a write sink into a session.
    async fn open_writer(
        &self,
        session_id: i32,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, InstallerError>;

    /// Commit a session. Success here only means the OS accepted the
    /// commit; the install verdict is delivered later via callback.
    async fn commit(&self, session_id: i32) -> Result<(), InstallerError>;

    /// Abandon a session, discarding staged bytes.
    ///
    /// May be refused by the OS (e.g. permission revoked mid-install);
    /// callers must treat refusal as "the session may still complete"
    /// rather than assuming the install is gone.
    async fn abandon(&self, session_id: i32) -> Result<(), InstallerError>;

    /// Whether a session is still active. `None` when the OS cannot
    /// report session activity; callers treat that as "unknown", never
    /// as "no".
    async fn is_active(&self, session_id: i32) -> Option<bool>;
}
