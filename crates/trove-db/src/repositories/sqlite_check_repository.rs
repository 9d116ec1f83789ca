//! `SQLite` implementation of the `CheckResultRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use trove_core::{CheckResultRepository, RepositoryError, UpdateCheckCode, UpdateCheckResult};

use super::{map_column_error, map_query_error};

/// `SQLite` implementation of the `CheckResultRepository` trait.
///
/// One row per installation; every upsert overwrites the previous
/// verdict wholesale.
pub struct SqliteCheckResultRepository {
    pool: SqlitePool,
}

impl SqliteCheckResultRepository {
    /// Create a new `SQLite` check result repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckResultRepository for SqliteCheckResultRepository {
    async fn upsert(&self, result: &UpdateCheckResult) -> Result<(), RepositoryError> {
        let download_page = result
            .download_page
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO update_checks (
                installation_id, code, upload_id, download_page, new_upload_name,
                new_version, new_size, new_timestamp, error_report, is_installing,
                checked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(installation_id) DO UPDATE SET
                code = excluded.code,
                upload_id = excluded.upload_id,
                download_page = excluded.download_page,
                new_upload_name = excluded.new_upload_name,
                new_version = excluded.new_version,
                new_size = excluded.new_size,
                new_timestamp = excluded.new_timestamp,
                error_report = excluded.error_report,
                is_installing = excluded.is_installing,
                checked_at = excluded.checked_at
            "#,
        )
        .bind(result.installation_id)
        .bind(result.code.as_str())
        .bind(result.upload_id)
        .bind(&download_page)
        .bind(&result.new_upload_name)
        .bind(&result.new_version)
        .bind(&result.new_size)
        .bind(&result.new_timestamp)
        .bind(&result.error_report)
        .bind(i64::from(result.is_installing))
        .bind(result.checked_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(())
    }

    async fn get(
        &self,
        installation_id: i64,
    ) -> Result<Option<UpdateCheckResult>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT installation_id, code, upload_id, download_page, new_upload_name,
                   new_version, new_size, new_timestamp, error_report, is_installing,
                   checked_at
            FROM update_checks WHERE installation_id = ?
            "#,
        )
        .bind(installation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.as_ref().map(row_to_result).transpose()
    }

    async fn list(&self) -> Result<Vec<UpdateCheckResult>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT installation_id, code, upload_id, download_page, new_upload_name,
                   new_version, new_size, new_timestamp, error_report, is_installing,
                   checked_at
            FROM update_checks ORDER BY installation_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.iter().map(row_to_result).collect()
    }

    async fn set_installing(
        &self,
        installation_id: i64,
        installing: bool,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE update_checks SET is_installing = ? WHERE installation_id = ?")
                .bind(i64::from(installing))
                .bind(installation_id)
                .execute(&self.pool)
                .await
                .map_err(map_query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Check result for installation '{installation_id}'"
            )));
        }

        Ok(())
    }

    async fn delete(&self, installation_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM update_checks WHERE installation_id = ?")
            .bind(installation_id)
            .execute(&self.pool)
            .await
            .map_err(map_query_error)?;

        Ok(())
    }
}

/// Convert a database row to an `UpdateCheckResult`.
fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> Result<UpdateCheckResult, RepositoryError> {
    let installation_id: i64 = row.try_get("installation_id").map_err(map_column_error)?;
    let code_str: String = row.try_get("code").map_err(map_column_error)?;
    let upload_id: Option<i64> = row.try_get("upload_id").map_err(map_column_error)?;
    let download_page_json: Option<String> =
        row.try_get("download_page").map_err(map_column_error)?;
    let new_upload_name: Option<String> =
        row.try_get("new_upload_name").map_err(map_column_error)?;
    let new_version: Option<String> = row.try_get("new_version").map_err(map_column_error)?;
    let new_size: Option<String> = row.try_get("new_size").map_err(map_column_error)?;
    let new_timestamp: Option<String> = row.try_get("new_timestamp").map_err(map_column_error)?;
    let error_report: Option<String> = row.try_get("error_report").map_err(map_column_error)?;
    let is_installing: i64 = row.try_get("is_installing").map_err(map_column_error)?;
    let checked_at_str: String = row.try_get("checked_at").map_err(map_column_error)?;

    let checked_at = DateTime::parse_from_rfc3339(&checked_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(UpdateCheckResult {
        installation_id,
        code: UpdateCheckCode::parse(&code_str),
        upload_id,
        download_page: download_page_json.and_then(|json| serde_json::from_str(&json).ok()),
        new_upload_name,
        new_version,
        new_size,
        new_timestamp,
        error_report,
        is_installing: is_installing != 0,
        checked_at,
    })
}
