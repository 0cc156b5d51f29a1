use super::*;
use crate::error::SupervisorError;
use crate::orchestrator::{InvocationPlan, ProcessOutput, ProcessRunner};
use crate::store::MemoryJobStore;
use crate::types::{Job, JobStatus};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


/// Runner that writes a small artifact named after the plan's token
struct WritingRunner;

#[async_trait]
impl ProcessRunner for WritingRunner {
    async fn run(
        &self,
        plan: &InvocationPlan,
        _timeout: Option<Duration>,
    ) -> std::result::Result<ProcessOutput, SupervisorError> {
        let dir = Path::new(&plan.output_template).parent().unwrap();
        tokio::fs::write(dir.join(format!("{}_clip.mp4", plan.token)), b"frames")
            .await
            .unwrap();
        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn name(&self) -> &'static str {
        "writing"
    }
}

/// Helper to create a test MediaDownloader with an in-memory store
fn create_test_downloader() -> (Arc<MediaDownloader>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().to_path_buf();
    config.locator.propagation_delay = Duration::ZERO;
    config.tools.cookies_file = temp_dir.path().join("cookies.txt");

    let downloader = MediaDownloader::with_components(
        config,
        Arc::new(MemoryJobStore::new()),
        Arc::new(WritingRunner),
    )
    .unwrap();
    (Arc::new(downloader), temp_dir)
}

fn router(downloader: &Arc<MediaDownloader>) -> Router {
    create_router(downloader.clone(), downloader.get_config())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn wait_for_terminal(downloader: &MediaDownloader, id: crate::types::JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(job) = downloader.get_job(id).await.unwrap()
                && job.status.is_terminal()
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let (downloader, _temp_dir) = create_test_downloader();

    let response = router(&downloader)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_json_is_served() {
    let (downloader, _temp_dir) = create_test_downloader();

    let response = router(&downloader)
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert_eq!(json["info"]["title"], "media-dl REST API");
    assert!(json["paths"].get("/jobs").is_some());
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let (downloader, _temp_dir) = create_test_downloader();
    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];

    let response = create_router(downloader.clone(), Arc::new(config))
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn cors_headers_absent_when_disabled() {
    let (downloader, _temp_dir) = create_test_downloader();
    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = false;

    let response = create_router(downloader.clone(), Arc::new(config))
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn specific_cors_origin_is_echoed() {
    let (downloader, _temp_dir) = create_test_downloader();
    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_origins = vec!["http://app.example".to_string()];

    let response = create_router(downloader.clone(), Arc::new(config))
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://app.example"
    );
}

#[tokio::test]
async fn server_spawns_on_ephemeral_port() {
    let (downloader, _temp_dir) = create_test_downloader();
    let mut config = (*downloader.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let handle = tokio::spawn(start_api_server(downloader.clone(), Arc::new(config)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!handle.is_finished());
    handle.abort();
}

#[tokio::test]
async fn completed_artifact_is_downloadable() {
    let (downloader, _temp_dir) = create_test_downloader();

    let id = downloader
        .submit("https://vimeo.com/42", crate::types::MediaFormat::Video, None)
        .await
        .unwrap();
    let job = wait_for_terminal(&downloader, id).await;
    assert_eq!(job.status, JobStatus::Completed);

    let response = router(&downloader)
        .oneshot(
            Request::builder()
                .uri(job.download_url.unwrap())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"frames");
}

#[tokio::test]
async fn unknown_file_is_404() {
    let (downloader, _temp_dir) = create_test_downloader();

    let response = router(&downloader)
        .oneshot(
            Request::builder()
                .uri("/files/nothing-here.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
