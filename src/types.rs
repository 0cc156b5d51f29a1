//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::platform::Platform;

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for JobId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Job status
///
/// `Pending` only exists for the duration of record creation; jobs are
/// created directly in `Processing`. `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Assigned but not yet dispatched
    Pending,
    /// Dispatched: the external tool is running, or the job waits its turn
    Processing,
    /// Artifact located and recorded
    Completed,
    /// Terminal failure, `error_message` explains why
    Failed,
}

impl JobStatus {
    /// Convert integer status code to JobStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => JobStatus::Pending,
            1 => JobStatus::Processing,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            _ => JobStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert JobStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed => 2,
            JobStatus::Failed => 3,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Re-asserting the current non-terminal state is allowed (the advisory
    /// waiting message is written while staying in `Processing`).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, _) => true,
            (JobStatus::Processing, JobStatus::Pending) => false,
            (JobStatus::Processing, _) => true,
            (JobStatus::Completed | JobStatus::Failed, _) => false,
        }
    }

    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested media kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Video with audio (default)
    #[default]
    Video,
    /// Audio only, extracted by the tool
    Audio,
    /// Still image / thumbnail
    Image,
}

impl MediaFormat {
    /// Convert integer format code to MediaFormat
    pub fn from_i32(format: i32) -> Self {
        match format {
            1 => MediaFormat::Audio,
            2 => MediaFormat::Image,
            _ => MediaFormat::Video,
        }
    }

    /// Convert MediaFormat to integer format code
    pub fn to_i32(&self) -> i32 {
        match self {
            MediaFormat::Video => 0,
            MediaFormat::Audio => 1,
            MediaFormat::Image => 2,
        }
    }

    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Video => "video",
            MediaFormat::Audio => "audio",
            MediaFormat::Image => "image",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record as held by the [`JobStore`](crate::store::JobStore)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Source URL as submitted
    pub url: String,
    /// Requested media kind
    pub format: MediaFormat,
    /// Requested quality (e.g. "best", "720")
    pub quality: Option<String>,
    /// Platform resolved from the URL at submission time
    pub platform: Platform,
    /// Current status
    pub status: JobStatus,
    /// Media title (from sidecar metadata, or a synthesized default)
    pub title: Option<String>,
    /// Artifact filename inside the output directory (set iff completed)
    pub filename: Option<String>,
    /// Artifact size in bytes
    pub file_size: Option<u64>,
    /// Relative URL the artifact is served from (set iff completed)
    pub download_url: Option<String>,
    /// Opaque metadata produced by the extraction
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    /// Failure reason, or an advisory message while waiting in the queue
    pub error_message: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a job
#[derive(Clone, Debug)]
pub struct NewJob {
    /// Source URL
    pub url: String,
    /// Requested media kind
    pub format: MediaFormat,
    /// Requested quality
    pub quality: Option<String>,
    /// Resolved platform
    pub platform: Platform,
    /// Initial status (the orchestrator always uses `Processing`)
    pub status: JobStatus,
}

/// Partial update of the mutable job fields
///
/// `None` leaves a field untouched. `error_message` is doubly optional so a
/// patch can clear the advisory waiting message with `Some(None)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobPatch {
    /// New status
    pub status: Option<JobStatus>,
    /// New title
    pub title: Option<String>,
    /// New artifact filename
    pub filename: Option<String>,
    /// New artifact size
    pub file_size: Option<u64>,
    /// New download URL
    pub download_url: Option<String>,
    /// New metadata
    pub metadata: Option<serde_json::Value>,
    /// Set (`Some(Some(_))`) or clear (`Some(None)`) the error message
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    /// True when the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self == &JobPatch::default()
    }

    /// Patch that marks a job failed with `message`
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(Some(message.into())),
            ..Default::default()
        }
    }

    /// Patch that sets the advisory waiting message (status untouched)
    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(Some(message.into())),
            ..Default::default()
        }
    }

    /// Patch that clears any advisory message
    pub fn clear_advisory() -> Self {
        Self {
            error_message: Some(None),
            ..Default::default()
        }
    }

    /// Apply this patch to a job in place
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(title) = &self.title {
            job.title = Some(title.clone());
        }
        if let Some(filename) = &self.filename {
            job.filename = Some(filename.clone());
        }
        if let Some(file_size) = self.file_size {
            job.file_size = Some(file_size);
        }
        if let Some(download_url) = &self.download_url {
            job.download_url = Some(download_url.clone());
        }
        if let Some(metadata) = &self.metadata {
            job.metadata = Some(metadata.clone());
        }
        if let Some(error_message) = &self.error_message {
            job.error_message = error_message.clone();
        }
    }
}
