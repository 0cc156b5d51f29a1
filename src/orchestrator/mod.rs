//! Download orchestration core.
//!
//! The `MediaDownloader` struct and its collaborators are organized by concern:
//! - [`strategy`] - Invocation planning per platform and format
//! - [`rate_queue`] - Serialized, spaced dispatch for the rate-sensitive platform
//! - [`supervisor`] - External tool execution with timeouts
//! - [`locator`] - Artifact discovery in the output directory
//! - [`classifier`] - Failure classification of tool runs
//! - [`pipeline`] - Background job execution and final state writes
//! - [`lifecycle`] - Startup recovery and shutdown coordination

pub mod classifier;
mod lifecycle;
pub mod locator;
mod pipeline;
pub mod rate_queue;
pub mod strategy;
pub mod supervisor;


pub use classifier::{FailureCategory, Outcome, classify, classify_supervisor_error};
pub use locator::{ArtifactLocator, SidecarMetadata, read_sidecar};
pub use rate_queue::{QueueTiming, RateQueue};
pub use strategy::{InvocationPlan, PlatformPolicy, StrategySelector};
pub use supervisor::{ProcessOutput, ProcessRunner, ProcessSupervisor};

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::platform::detect_platform;
use crate::store::JobStore;
use crate::types::{Job, JobId, JobStatus, MediaFormat, NewJob};
use crate::utils::{generate_token, validate_media_url};

/// Dispatch bookkeeping shared by all job tasks
#[derive(Clone)]
pub(crate) struct DispatchState {
    /// Semaphore bounding concurrently running non-serialized jobs
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Jobs whose background task has not finished yet
    pub(crate) active_jobs: Arc<tokio::sync::Mutex<HashSet<JobId>>>,
    /// Flag to indicate whether new submissions are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Job record store; status is observed through it
    pub store: Arc<dyn JobStore>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Builds invocation plans
    pub(crate) selector: StrategySelector,
    /// Runs the external tool (trait object so tests can substitute it)
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Finds produced artifacts
    pub(crate) locator: ArtifactLocator,
    /// Serialized queue for the rate-sensitive platform
    pub(crate) queue: RateQueue,
    /// Dispatch bookkeeping
    pub(crate) dispatch: DispatchState,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration and creates the output directory
    /// - Opens/creates the SQLite database and runs migrations
    /// - Marks jobs interrupted by a previous process as failed
    /// - Resolves the yt-dlp executable (absence is logged, not fatal)
    /// - Spawns the serialized queue actor
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.output_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.output_dir().display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        let recovered = Self::recover_interrupted_jobs(&db).await?;
        if recovered > 0 {
            tracing::warn!(recovered, "Marked jobs interrupted by restart as failed");
        }

        let runner = Arc::new(ProcessSupervisor::discover(&config.tools));

        Self::with_components(config, Arc::new(db), runner)
    }

    /// Assemble an instance from explicit collaborators
    ///
    /// No directories are created and no recovery runs. Must be called from
    /// within a Tokio runtime because the queue actor is spawned here.
    pub fn with_components(
        config: Config,
        store: Arc<dyn JobStore>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        config.validate()?;

        let selector = StrategySelector::new(config.output_dir().clone(), &config.tools);
        let locator = ArtifactLocator::new(&config.locator);
        let queue = RateQueue::spawn(
            store.clone(),
            config.queue.serialized_platform,
            QueueTiming {
                min_delay: config.queue.min_delay,
                inter_item_delay: config.queue.inter_item_delay,
            },
        );

        let dispatch = DispatchState {
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(
                config.download.max_concurrent_jobs,
            )),
            active_jobs: Arc::new(tokio::sync::Mutex::new(HashSet::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        tracing::info!(
            runner = runner.name(),
            serialized_platform = %config.queue.serialized_platform,
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            "Media downloader initialized"
        );

        Ok(Self {
            store,
            config: Arc::new(config),
            selector,
            runner,
            locator,
            queue,
            dispatch,
        })
    }

    /// Submit a URL for download
    ///
    /// Validates the URL, creates the job record in `processing` and spawns
    /// the background task. Returns as soon as the record exists; progress is
    /// observed through [`MediaDownloader::store`].
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`MediaDownloader::shutdown`] has begun
    /// - [`Error::InvalidUrl`] for malformed or non-http(s) URLs
    /// - store errors if the record cannot be created
    pub async fn submit(
        &self,
        url: &str,
        format: MediaFormat,
        quality: Option<String>,
    ) -> Result<JobId> {
        if !self.dispatch.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        validate_media_url(url)?;

        let url = url.trim().to_string();
        let platform = detect_platform(&url);
        let quality = quality
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let job = self
            .store
            .create(NewJob {
                url,
                format,
                quality,
                platform,
                status: JobStatus::Processing,
            })
            .await?;
        let id = job.id;

        tracing::info!(
            job_id = id.0,
            platform = %platform,
            format = %format,
            "Job submitted"
        );

        let token = generate_token(id.0);
        let plan = self.selector.select(
            &job.url,
            job.platform,
            job.format,
            job.quality.as_deref(),
            &token,
        );

        // Queue position is taken now so submission order is dispatch order
        let turn = if platform == self.config.queue.serialized_platform {
            Some(self.queue.enqueue(id))
        } else {
            None
        };

        self.dispatch.active_jobs.lock().await.insert(id);

        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.run_job(job, plan, turn).await;
            downloader.dispatch.active_jobs.lock().await.remove(&id);
        });

        Ok(id)
    }

    /// Fetch a job record
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.store.get(id).await
    }

    /// The most recent jobs, newest first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        self.store.list_recent(limit).await
    }

    /// Delete a job record
    ///
    /// A still-running job keeps running; its final update becomes a no-op.
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::info!(job_id = id.0, "Job deleted");
        }
        Ok(deleted)
    }

    /// Number of jobs whose background task is still running
    pub async fn active_job_count(&self) -> usize {
        self.dispatch.active_jobs.lock().await.len()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address
    /// (default: 127.0.0.1:6790).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
