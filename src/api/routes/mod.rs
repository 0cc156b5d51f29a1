//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission and status
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::{JobId, MediaFormat};

mod jobs;
mod system;

pub use jobs::*;
pub use system::*;

/// Default page size for GET /jobs
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Largest page size GET /jobs will return
pub const MAX_LIST_LIMIT: usize = 500;

/// Request body for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitJobRequest {
    /// Media page or direct file URL
    pub url: String,
    /// Requested media kind (default: video)
    #[serde(default)]
    pub format: MediaFormat,
    /// Quality hint such as "720" or "best"
    #[serde(default)]
    pub quality: Option<String>,
}

/// Response for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitJobResponse {
    /// ID of the created job
    pub id: JobId,
}

/// Query parameters for GET /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsQuery {
    /// Maximum number of jobs to return (default: 50, capped at 500)
    pub limit: Option<usize>,
}
