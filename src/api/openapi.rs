//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the media-dl REST API using utoipa
//! for compile-time spec generation. Served at `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Submit media URLs for background download and track the resulting jobs",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::delete_job,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::Job,
        crate::types::JobStatus,
        crate::types::MediaFormat,
        crate::platform::Platform,

        crate::api::routes::SubmitJobRequest,
        crate::api::routes::SubmitJobResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Jobs - Submit URLs and observe download status"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_job_paths() {
        let spec = ApiDoc::openapi();

        assert!(spec.paths.paths.contains_key("/jobs"));
        assert!(spec.paths.paths.contains_key("/jobs/{id}"));
        assert!(spec.paths.paths.contains_key("/health"));
    }

    #[test]
    fn spec_has_job_schema() {
        let spec = ApiDoc::openapi();
        let components = spec.components.unwrap();

        assert!(components.schemas.contains_key("Job"));
        assert!(components.schemas.contains_key("ApiError"));
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "media-dl REST API");
    }
}
