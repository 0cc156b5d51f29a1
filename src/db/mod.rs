//! Database layer for media-dl
//!
//! Handles SQLite persistence for job records.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`jobs`] - Job record CRUD

use crate::platform::Platform;
use crate::types::{Job, JobId, JobStatus, MediaFormat};
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

/// Job record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Unique database ID (AUTOINCREMENT, never reused)
    pub id: i64,
    /// Source URL
    pub url: String,
    /// Media format code (see [`MediaFormat::to_i32`])
    pub format: i32,
    /// Requested quality
    pub quality: Option<String>,
    /// Platform display name
    pub platform: String,
    /// Status code (see [`JobStatus::to_i32`])
    pub status: i32,
    /// Media title
    pub title: Option<String>,
    /// Artifact filename
    pub filename: Option<String>,
    /// Artifact size in bytes
    pub file_size: Option<i64>,
    /// Artifact download URL
    pub download_url: Option<String>,
    /// Metadata as JSON text
    pub metadata: Option<String>,
    /// Failure reason or advisory message
    pub error_message: Option<String>,
    /// Unix timestamp when the job was created
    pub created_at: i64,
}

impl JobRow {
    /// Decode the raw row into a [`Job`]
    ///
    /// Metadata that no longer parses is dropped with a warning rather than
    /// making the whole record unreadable.
    pub fn into_job(self) -> Job {
        let id = self.id;
        let metadata = self.metadata.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| {
                    tracing::warn!(job_id = id, error = %e, "Discarding unparseable job metadata");
                })
                .ok()
        });

        Job {
            id: JobId(id),
            url: self.url,
            format: MediaFormat::from_i32(self.format),
            quality: self.quality,
            platform: Platform::from_name(&self.platform),
            status: JobStatus::from_i32(self.status),
            title: self.title,
            filename: self.filename,
            file_size: self.file_size.map(|s| s.max(0) as u64),
            download_url: self.download_url,
            metadata,
            error_message: self.error_message,
            created_at: chrono::DateTime::from_timestamp(self.created_at, 0)
                .unwrap_or_else(chrono::Utc::now),
        }
    }
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
