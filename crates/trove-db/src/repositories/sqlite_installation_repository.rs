//! `SQLite` implementation of the `InstallationRepository` trait.
//!
//! The guarded transition is a single conditional UPDATE keyed on the
//! expected status; `rows_affected` distinguishes an applied transition
//! from the two benign no-op outcomes.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use trove_core::{
    InstallStatus, Installation, InstallationRepository, Locale, Platforms, RepositoryError,
    SessionRef, SessionUpdate, TransitionOutcome, UNSET_ID,
};

use super::{map_column_error, map_query_error};

/// `SQLite` implementation of the `InstallationRepository` trait.
pub struct SqliteInstallationRepository {
    pool: SqlitePool,
}

impl SqliteInstallationRepository {
    /// Create a new `SQLite` installation repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallationRepository for SqliteInstallationRepository {
    async fn insert(&self, installation: &Installation) -> Result<i64, RepositoryError> {
        if installation.internal_id != UNSET_ID {
            return Err(RepositoryError::Constraint(format!(
                "installation already persisted with id {}",
                installation.internal_id
            )));
        }

        let available = serde_json::to_string(&installation.available_upload_ids)
            .unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO installations (
                game_id, upload_id, available_upload_ids, session_kind, session_id,
                status, package_name, external_file_uri, upload_name, version,
                upload_timestamp, file_size, platforms, locale
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(installation.game_id)
        .bind(installation.upload_id)
        .bind(&available)
        .bind(installation.session.map(|s| s.kind_str()))
        .bind(installation.session.map(|s| s.raw_id()))
        .bind(installation.status.as_str())
        .bind(&installation.package_name)
        .bind(&installation.external_file_uri)
        .bind(&installation.upload_name)
        .bind(&installation.version)
        .bind(&installation.upload_timestamp)
        .bind(&installation.file_size)
        .bind(i64::from(installation.platforms.bits()))
        .bind(installation.locale.tag())
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn get(&self, internal_id: i64) -> Result<Option<Installation>, RepositoryError> {
        let row = sqlx::query(&select_sql("WHERE internal_id = ?"))
            .bind(internal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_error)?;

        row.as_ref().map(row_to_installation).transpose()
    }

    async fn find_by_session(
        &self,
        session: SessionRef,
    ) -> Result<Option<Installation>, RepositoryError> {
        let row = sqlx::query(&select_sql("WHERE session_kind = ? AND session_id = ?"))
            .bind(session.kind_str())
            .bind(session.raw_id())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_error)?;

        row.as_ref().map(row_to_installation).transpose()
    }

    async fn find_pending_for_upload(
        &self,
        upload_id: i64,
    ) -> Result<Vec<Installation>, RepositoryError> {
        let rows = sqlx::query(&select_sql(
            "WHERE upload_id = ? AND status IN ('downloading', 'ready_to_install', 'installing')",
        ))
        .bind(upload_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.iter().map(row_to_installation).collect()
    }

    async fn list_for_game(&self, game_id: i64) -> Result<Vec<Installation>, RepositoryError> {
        let rows = sqlx::query(&select_sql("WHERE game_id = ? ORDER BY internal_id ASC"))
            .bind(game_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_error)?;

        rows.iter().map(row_to_installation).collect()
    }

    async fn list_by_status(
        &self,
        status: InstallStatus,
    ) -> Result<Vec<Installation>, RepositoryError> {
        let rows = sqlx::query(&select_sql("WHERE status = ? ORDER BY internal_id ASC"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_error)?;

        rows.iter().map(row_to_installation).collect()
    }

    async fn update(&self, installation: &Installation) -> Result<(), RepositoryError> {
        let available = serde_json::to_string(&installation.available_upload_ids)
            .unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            UPDATE installations SET
                game_id = ?, upload_id = ?, available_upload_ids = ?,
                session_kind = ?, session_id = ?, status = ?, package_name = ?,
                external_file_uri = ?, upload_name = ?, version = ?,
                upload_timestamp = ?, file_size = ?, platforms = ?, locale = ?
            WHERE internal_id = ?
            "#,
        )
        .bind(installation.game_id)
        .bind(installation.upload_id)
        .bind(&available)
        .bind(installation.session.map(|s| s.kind_str()))
        .bind(installation.session.map(|s| s.raw_id()))
        .bind(installation.status.as_str())
        .bind(&installation.package_name)
        .bind(&installation.external_file_uri)
        .bind(&installation.upload_name)
        .bind(&installation.version)
        .bind(&installation.upload_timestamp)
        .bind(&installation.file_size)
        .bind(i64::from(installation.platforms.bits()))
        .bind(installation.locale.tag())
        .bind(installation.internal_id)
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Installation with ID '{}'",
                installation.internal_id
            )));
        }

        Ok(())
    }

    async fn transition(
        &self,
        internal_id: i64,
        expected: InstallStatus,
        next: InstallStatus,
        session: SessionUpdate,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let result = match session {
            SessionUpdate::Keep => {
                sqlx::query(
                    "UPDATE installations SET status = ? WHERE internal_id = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(internal_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
            }
            SessionUpdate::Set(session_ref) => {
                sqlx::query(
                    "UPDATE installations SET status = ?, session_kind = ?, session_id = ? \
                     WHERE internal_id = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(session_ref.kind_str())
                .bind(session_ref.raw_id())
                .bind(internal_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
            }
            SessionUpdate::Clear => {
                sqlx::query(
                    "UPDATE installations SET status = ?, session_kind = NULL, session_id = NULL \
                     WHERE internal_id = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(internal_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
            }
        }
        .map_err(map_query_error)?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }

        // Distinguish the two no-op outcomes for the caller's logging
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT internal_id FROM installations WHERE internal_id = ?")
                .bind(internal_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_query_error)?;

        Ok(if exists.is_some() {
            TransitionOutcome::StatusMismatch
        } else {
            TransitionOutcome::MissingRow
        })
    }

    async fn delete(&self, internal_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM installations WHERE internal_id = ?")
            .bind(internal_id)
            .execute(&self.pool)
            .await
            .map_err(map_query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Shared column list for every SELECT.
fn select_sql(clause: &str) -> String {
    format!(
        "SELECT internal_id, game_id, upload_id, available_upload_ids, session_kind, \
         session_id, status, package_name, external_file_uri, upload_name, version, \
         upload_timestamp, file_size, platforms, locale FROM installations {clause}"
    )
}

/// Convert a database row to an `Installation`.
fn row_to_installation(row: &sqlx::sqlite::SqliteRow) -> Result<Installation, RepositoryError> {
    let internal_id: i64 = row.try_get("internal_id").map_err(map_column_error)?;
    let game_id: i64 = row.try_get("game_id").map_err(map_column_error)?;
    let upload_id: Option<i64> = row.try_get("upload_id").map_err(map_column_error)?;
    let available_json: String = row
        .try_get("available_upload_ids")
        .map_err(map_column_error)?;
    let session_kind: Option<String> = row.try_get("session_kind").map_err(map_column_error)?;
    let session_id: Option<i64> = row.try_get("session_id").map_err(map_column_error)?;
    let status_str: String = row.try_get("status").map_err(map_column_error)?;
    let package_name: Option<String> = row.try_get("package_name").map_err(map_column_error)?;
    let external_file_uri: Option<String> =
        row.try_get("external_file_uri").map_err(map_column_error)?;
    let upload_name: String = row.try_get("upload_name").map_err(map_column_error)?;
    let version: Option<String> = row.try_get("version").map_err(map_column_error)?;
    let upload_timestamp: Option<String> =
        row.try_get("upload_timestamp").map_err(map_column_error)?;
    let file_size: Option<String> = row.try_get("file_size").map_err(map_column_error)?;
    let platforms_bits: i64 = row.try_get("platforms").map_err(map_column_error)?;
    let locale_tag: Option<String> = row.try_get("locale").map_err(map_column_error)?;

    let status = InstallStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Storage(format!("unknown installation status '{status_str}'"))
    })?;

    let session = match (session_kind, session_id) {
        (Some(kind), Some(id)) => SessionRef::from_stored(&kind, id),
        _ => None,
    };

    let available_upload_ids: Vec<i64> =
        serde_json::from_str(&available_json).unwrap_or_default();

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "platform bits fit in u32 by construction"
    )]
    let platforms = Platforms::from_bits_truncate(platforms_bits as u32);

    Ok(Installation {
        internal_id,
        game_id,
        upload_id,
        available_upload_ids,
        session,
        status,
        package_name,
        external_file_uri,
        upload_name,
        version,
        upload_timestamp,
        file_size,
        platforms,
        locale: Locale::from_tag(locale_tag),
    })
}
