//! Background job execution.
//!
//! Every failure inside a job ends as a `failed` record; nothing is raised
//! to the submitter.

use std::future::Future;
use std::path::Path;

use crate::error::Result;
use crate::types::{Job, JobId, JobPatch, JobStatus};
use crate::utils::download_url_for;

use super::MediaDownloader;
use super::classifier::{FailureCategory, Outcome, classify, classify_supervisor_error};
use super::locator::read_sidecar;
use super::strategy::InvocationPlan;

impl MediaDownloader {
    /// Run one job to a terminal state
    ///
    /// `turn` is the serialized queue slot for the rate-sensitive platform;
    /// other jobs wait for a concurrency permit instead.
    pub(crate) async fn run_job<T>(&self, job: Job, plan: InvocationPlan, turn: Option<T>)
    where
        T: Future<Output = Result<()>> + Send,
    {
        let id = job.id;

        let _permit = match turn {
            Some(turn) => {
                if let Err(e) = turn.await {
                    tracing::warn!(job_id = id.0, error = %e, "Serialized job never got its turn");
                    self.finish_job(
                        id,
                        JobPatch::failed("Download was cancelled because the service is shutting down."),
                    )
                    .await;
                    return;
                }
                None
            }
            None => match self.dispatch.concurrent_limit.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    tracing::error!(job_id = id.0, error = %e, "Concurrency limiter closed");
                    self.finish_job(id, JobPatch::failed("Download could not be scheduled."))
                        .await;
                    return;
                }
            },
        };

        tracing::info!(
            job_id = id.0,
            platform = %job.platform,
            token = %plan.token,
            "Dispatching job"
        );

        match self.execute(&job, &plan).await {
            Ok(patch) => {
                tracing::info!(
                    job_id = id.0,
                    platform = %job.platform,
                    filename = patch.filename.as_deref().unwrap_or_default(),
                    "Job completed"
                );
                self.finish_job(id, patch).await;
            }
            Err((category, message)) => {
                tracing::warn!(
                    job_id = id.0,
                    platform = %job.platform,
                    category = %category,
                    message = %message,
                    "Job failed"
                );
                self.finish_job(id, JobPatch::failed(message)).await;
            }
        }
    }

    /// Supervise the tool, classify its output and locate the artifact
    ///
    /// Returns the completion patch, or the failure category and message.
    async fn execute(
        &self,
        job: &Job,
        plan: &InvocationPlan,
    ) -> std::result::Result<JobPatch, (FailureCategory, String)> {
        let output = self
            .runner
            .run(plan, self.config.download.process_timeout)
            .await
            .map_err(|e| {
                tracing::debug!(job_id = job.id.0, error = %e, "Supervisor error");
                into_failure(classify_supervisor_error(&e))
            })?;

        let outcome = classify(output.exit_code, &output.stdout, &output.stderr, job.platform);
        if !outcome.is_success() {
            return Err(into_failure(outcome));
        }

        let output_dir = self.selector.output_dir();
        let Some(artifact) = self.locator.locate(output_dir, &plan.token).await else {
            return Err((
                FailureCategory::NoOutput,
                "The download finished but no output file was found.".to_string(),
            ));
        };

        Ok(self.completion_patch(job, output_dir, &artifact, &plan.token).await)
    }

    async fn completion_patch(
        &self,
        job: &Job,
        output_dir: &Path,
        artifact: &Path,
        token: &str,
    ) -> JobPatch {
        let filename = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file_size = match tokio::fs::metadata(artifact).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                tracing::warn!(job_id = job.id.0, error = %e, "Failed to stat artifact");
                None
            }
        };

        let sidecar = read_sidecar(output_dir, token).await.unwrap_or_default();
        let title = sidecar
            .title
            .unwrap_or_else(|| format!("{} {}", job.platform, job.format));
        let metadata = if sidecar.metadata.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(sidecar.metadata))
        };

        JobPatch {
            status: Some(JobStatus::Completed),
            title: Some(title),
            download_url: Some(download_url_for(
                &self.config.download.files_route,
                &filename,
            )),
            filename: Some(filename),
            file_size,
            metadata,
            error_message: Some(None),
        }
    }

    /// Write the terminal patch for a job
    ///
    /// A deleted record is a silent no-op and an already terminal record is
    /// never overwritten. Store errors are logged since there is nobody to
    /// return them to.
    pub(crate) async fn finish_job(&self, id: JobId, patch: JobPatch) {
        match self.store.get(id).await {
            Ok(None) => {
                tracing::debug!(job_id = id.0, "Job deleted before completion, dropping result");
                return;
            }
            Ok(Some(current)) => {
                if let Some(next) = patch.status
                    && !current.status.can_transition_to(next)
                {
                    tracing::warn!(
                        job_id = id.0,
                        from = %current.status,
                        to = %next,
                        "Refusing to overwrite terminal job state"
                    );
                    return;
                }
            }
            Err(e) => {
                tracing::error!(job_id = id.0, error = %e, "Failed to read job before final update");
                return;
            }
        }

        match self.store.update(id, &patch).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(job_id = id.0, "Job deleted before completion, dropping result");
            }
            Err(e) => {
                tracing::error!(job_id = id.0, error = %e, "Failed to record final job state");
            }
        }
    }
}

fn into_failure(outcome: Outcome) -> (FailureCategory, String) {
    match outcome {
        Outcome::Failure { category, message } => (category, message),
        Outcome::Success => (
            FailureCategory::Internal,
            "Download failed for an unknown reason.".to_string(),
        ),
    }
}
