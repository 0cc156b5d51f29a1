//! Job record CRUD operations.

use crate::error::DatabaseError;
use crate::types::{Job, JobId, JobPatch, JobStatus, NewJob};
use crate::{Error, Result};

use super::{Database, JobRow};

const JOB_COLUMNS: &str = r#"
    id, url, format, quality, platform, status, title, filename,
    file_size, download_url, metadata, error_message, created_at
"#;

impl Database {
    /// Insert a new job record and return it
    pub async fn insert_job(&self, job: &NewJob) -> Result<Job> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (url, format, quality, platform, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.url)
        .bind(job.format.to_i32())
        .bind(&job.quality)
        .bind(job.platform.name())
        .bind(job.status.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            )))
        })?;

        Ok(Job {
            id: JobId(result.last_insert_rowid()),
            url: job.url.clone(),
            format: job.format,
            quality: job.quality.clone(),
            platform: job.platform,
            status: job.status,
            title: None,
            filename: None,
            file_size: None,
            download_url: None,
            metadata: None,
            error_message: None,
            created_at: chrono::DateTime::from_timestamp(now, 0).unwrap_or_else(chrono::Utc::now),
        })
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row.map(JobRow::into_job))
    }

    /// Apply a partial update to a job
    ///
    /// Returns `None` when the job does not exist. An empty patch issues no
    /// write and returns the current record.
    pub async fn update_job(&self, id: JobId, patch: &JobPatch) -> Result<Option<Job>> {
        if patch.is_empty() {
            return self.get_job(id).await;
        }

        let metadata = patch
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut query_builder = sqlx::QueryBuilder::new("UPDATE jobs SET ");
        {
            let mut fields = query_builder.separated(", ");
            if let Some(status) = patch.status {
                fields.push("status = ");
                fields.push_bind_unseparated(status.to_i32());
            }
            if let Some(title) = &patch.title {
                fields.push("title = ");
                fields.push_bind_unseparated(title.clone());
            }
            if let Some(filename) = &patch.filename {
                fields.push("filename = ");
                fields.push_bind_unseparated(filename.clone());
            }
            if let Some(file_size) = patch.file_size {
                fields.push("file_size = ");
                fields.push_bind_unseparated(i64::try_from(file_size).unwrap_or(i64::MAX));
            }
            if let Some(download_url) = &patch.download_url {
                fields.push("download_url = ");
                fields.push_bind_unseparated(download_url.clone());
            }
            if let Some(metadata) = metadata {
                fields.push("metadata = ");
                fields.push_bind_unseparated(metadata);
            }
            if let Some(error_message) = &patch.error_message {
                fields.push("error_message = ");
                fields.push_bind_unseparated(error_message.clone());
            }
        }
        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);

        let result = query_builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update job: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_job(id).await
    }

    /// List the most recently created jobs, newest first
    pub async fn list_recent_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?",
            JOB_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    /// List jobs with a specific status, oldest first
    pub async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE status = ? ORDER BY id ASC",
            JOB_COLUMNS
        ))
        .bind(status.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs by status: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    /// Delete a job; returns whether a record was removed
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete job: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
