// SQLite JobStore Implementation

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracklab_core::domain::{Job, JobId, JobKind, JobProgress, JobStatus};
use tracklab_core::port::{IdProvider, JobStore, StoreError, TimeProvider};

// Helper to convert sqlx::Error to StoreError with structured information
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => StoreError::Conflict(format!(
                        "unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => StoreError::Conflict(format!(
                        "foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // SQLITE_BUSY / SQLITE_LOCKED: transient, worth retrying
                    "5" | "6" | "517" => StoreError::Unavailable(format!(
                        "database locked: {}",
                        db_err.message()
                    )),
                    "13" => StoreError::Unavailable(format!(
                        "database full: {}",
                        db_err.message()
                    )),
                    _ => StoreError::Backend(format!(
                        "database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                StoreError::Backend(format!("database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => StoreError::Backend("row not found".to_string()),
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable("connection pool timed out".to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, StoreError> {
    match raw {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(StoreError::Backend(format!(
            "unknown job status in store: {}",
            other
        ))),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobStore {
    pub fn new(
        pool: SqlitePool,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            id_provider,
            time_provider,
        }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job, StoreError> {
        let status: String = row.get("status");
        Ok(Job {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            kind: JobKind::new(row.get::<String, _>("kind")),
            status: parse_status(&status)?,
            progress: JobProgress {
                total: row.get::<i64, _>("total") as u32,
                done: row.get::<i64, _>("done") as u32,
                succeeded: row.get::<i64, _>("succeeded") as u32,
                failed: row.get::<i64, _>("failed") as u32,
                cursor: row.get("cursor"),
            },
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Distinguish NotFound from Conflict after a guarded UPDATE matched
    /// zero rows
    async fn classify_miss(&self, id: &JobId, attempted: &str) -> StoreError {
        let status: Option<String> =
            match sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
            {
                Ok(status) => status,
                Err(err) => return map_sqlx_error(err),
            };
        match status {
            None => StoreError::NotFound(id.clone()),
            Some(current) => StoreError::Conflict(format!(
                "cannot set job {} to {} from status {}",
                id, attempted, current
            )),
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job(&self, owner_id: &str, kind: &JobKind) -> Result<Job, StoreError> {
        let job = Job::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            owner_id,
            kind.clone(),
        );

        sqlx::query(
            r#"
            INSERT INTO jobs (id, owner_id, kind, status, total, done, succeeded, failed,
                              cursor, error_message, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', 0, 0, 0, 0, NULL, NULL, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owner_id)
        .bind(job.kind.as_str())
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| Self::row_to_job(&row)).transpose()
    }

    async fn set_running(&self, id: &JobId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', updated_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(self.time_provider.now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(id, "running").await);
        }
        Ok(())
    }

    async fn set_completed(&self, id: &JobId) -> Result<(), StoreError> {
        // Status is guarded in SQL: a terminal row can never be rewritten
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'completed', updated_at = ?
            WHERE id = ? AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(self.time_provider.now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(id, "completed").await);
        }
        Ok(())
    }

    async fn set_failed(&self, id: &JobId, message: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'failed', error_message = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(message)
        .bind(self.time_provider.now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(id, "failed").await);
        }
        Ok(())
    }

    async fn set_progress(&self, id: &JobId, progress: &JobProgress) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET total = ?, done = ?, succeeded = ?, failed = ?, cursor = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(progress.total as i64)
        .bind(progress.done as i64)
        .bind(progress.succeeded as i64)
        .bind(progress.failed as i64)
        .bind(&progress.cursor)
        .bind(self.time_provider.now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}
