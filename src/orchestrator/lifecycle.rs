//! Startup recovery and shutdown coordination.

use crate::db::Database;
use crate::error::Result;
use crate::types::{JobPatch, JobStatus};

use super::MediaDownloader;

/// Message stored on jobs that were running when the previous process exited
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by restart";

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Waits for running jobs to finish with a timeout (30 seconds)
    /// 3. Stops the serialized queue; jobs still waiting in it fail
    ///
    /// Running external processes are never cancelled. Jobs still running
    /// after the timeout are marked failed by the next startup.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new submissions
        self.dispatch
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        // 2. Wait for active jobs to complete with timeout
        let shutdown_timeout = std::time::Duration::from_secs(30);
        let wait_result =
            tokio::time::timeout(shutdown_timeout, self.wait_for_active_jobs()).await;

        match wait_result {
            Ok(()) => {
                tracing::info!("All active jobs completed gracefully");
            }
            Err(_) => {
                tracing::warn!(
                    active_count = self.active_job_count().await,
                    "Timeout waiting for jobs to complete, proceeding with shutdown"
                );
            }
        }

        // 3. Stop the queue actor
        self.queue.close();

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until no job task is running
    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.active_job_count().await;

            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active jobs to complete");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    /// Fail jobs a previous process left in a non-terminal state
    ///
    /// Their external processes died with that process and there is no way
    /// to resume them. Returns the number of jobs marked failed.
    pub async fn recover_interrupted_jobs(db: &Database) -> Result<usize> {
        let mut recovered = 0;

        for status in [JobStatus::Processing, JobStatus::Pending] {
            for job in db.list_jobs_by_status(status).await? {
                if db
                    .update_job(job.id, &JobPatch::failed(INTERRUPTED_MESSAGE))
                    .await?
                    .is_some()
                {
                    tracing::debug!(job_id = job.id.0, "Marked interrupted job as failed");
                    recovered += 1;
                }
            }
        }

        Ok(recovered)
    }
}
