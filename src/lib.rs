//! # media-dl
//!
//! Background media download orchestration around the `yt-dlp` command-line
//! tool.
//!
//! A caller submits a URL and gets a job id back immediately. The job then
//! runs in the background:
//!
//! 1. the URL's platform selects an invocation strategy (user agent, headers,
//!    format selection, request pacing, credentials)
//! 2. jobs for the rate-sensitive platform (Instagram by default) go through
//!    a serialized queue that spaces dispatches at least a minute apart
//! 3. the tool runs under a supervisor with a wall-clock timeout
//! 4. stderr is checked for known failure patterns before the exit code is
//!    trusted
//! 5. the produced file is located in the output directory and recorded on
//!    the job
//!
//! Progress is observed by reading the job record through the
//! [`JobStore`]; there are no callbacks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaDownloader, MediaFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     let id = downloader
//!         .submit("https://www.youtube.com/watch?v=dQw4w9WgXcQ", MediaFormat::Audio, None)
//!         .await?;
//!
//!     if let Some(job) = downloader.get_job(id).await? {
//!         println!("job {} is {}", job.id, job.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Download orchestration (strategy, queue, supervisor, locator, classifier)
pub mod orchestrator;
/// Platform detection from URLs
pub mod platform;
/// Job record store abstraction
pub mod store;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, SupervisorError, ToHttpStatus};
pub use orchestrator::{
    FailureCategory, InvocationPlan, MediaDownloader, ProcessOutput, ProcessRunner,
    ProcessSupervisor,
};
pub use platform::{Platform, detect_platform};
pub use store::{JobStore, MemoryJobStore};
pub use types::{Job, JobId, JobPatch, JobStatus, MediaFormat, NewJob};

/// Run the downloader until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever
///   handler could be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
