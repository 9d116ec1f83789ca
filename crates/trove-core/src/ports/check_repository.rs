//! Update-check result repository port definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::UpdateCheckResult;

/// Port for persisting the latest verdict per installation.
///
/// Results are keyed by `installation_id` and overwritten on every
/// check; there is no history table.
#[async_trait]
pub trait CheckResultRepository: Send + Sync {
    /// Insert or replace the verdict for an installation.
    async fn upsert(&self, result: &UpdateCheckResult) -> Result<(), RepositoryError>;

    /// Fetch the latest verdict for an installation.
    async fn get(&self, installation_id: i64)
    -> Result<Option<UpdateCheckResult>, RepositoryError>;

    /// All stored verdicts.
    async fn list(&self) -> Result<Vec<UpdateCheckResult>, RepositoryError>;

    /// Flip the UI-coordination flag without touching the verdict.
    async fn set_installing(
        &self,
        installation_id: i64,
        installing: bool,
    ) -> Result<(), RepositoryError>;

    /// Drop the verdict for an installation (e.g. when its row is
    /// deleted). Missing rows are not an error.
    async fn delete(&self, installation_id: i64) -> Result<(), RepositoryError>;
}
