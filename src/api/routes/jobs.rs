//! Job management handlers.

use super::{DEFAULT_LIST_LIMIT, ListJobsQuery, MAX_LIST_LIMIT, SubmitJobRequest, SubmitJobResponse};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{Job, JobId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// POST /jobs - Submit a URL for download
#[utoipa::path(
    post,
    path = "/jobs",
    tag = "jobs",
    request_body = SubmitJobRequest,
    responses(
        (status = 202, description = "Job accepted and running in the background", body = SubmitJobResponse),
        (status = 400, description = "URL rejected", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>)> {
    let id = state
        .downloader
        .submit(&request.url, request.format, request.quality)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse { id })))
}

/// GET /jobs - List recent jobs, newest first
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Recent jobs", body = Vec<Job>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let jobs = state.downloader.list_recent(limit).await?;
    Ok(Json(jobs))
}

/// GET /jobs/:id - Get single job
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job record", body = Job),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Job>> {
    match state.downloader.get_job(JobId(id)).await? {
        Some(job) => Ok(Json(job)),
        None => Err(Error::NotFound(format!("job {}", id))),
    }
}

/// DELETE /jobs/:id - Delete a job record
///
/// A running job keeps running; its result is discarded.
#[utoipa::path(
    delete,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    if state.downloader.delete_job(JobId(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("job {}", id)))
    }
}
