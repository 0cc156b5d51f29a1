//! Serialized dispatch for the rate-sensitive platform
//!
//! A single actor task owns the FIFO order and the last-dispatch instant.
//! Jobs ask for their turn over an `mpsc` channel and are released through a
//! `oneshot`, so consecutive dispatches are always at least `min_delay` apart.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::store::JobStore;
use crate::types::{JobId, JobPatch};

struct TurnRequest {
    job_id: JobId,
    release: oneshot::Sender<()>,
}

/// Handle to the queue actor (cheap to clone)
#[derive(Clone)]
pub struct RateQueue {
    tx: mpsc::UnboundedSender<TurnRequest>,
    waiting: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
}

/// Timing of the serialized queue
#[derive(Clone, Copy, Debug)]
pub struct QueueTiming {
    /// Minimum spacing between consecutive dispatches
    pub min_delay: Duration,
    /// Pause after each release before the next entry is considered
    pub inter_item_delay: Duration,
}

impl RateQueue {
    /// Spawn the actor task and return its handle
    ///
    /// `platform` only appears in the advisory waiting message.
    pub fn spawn(store: Arc<dyn JobStore>, platform: Platform, timing: QueueTiming) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let waiting = Arc::new(AtomicUsize::new(0));
        let cancel_token = CancellationToken::new();

        tokio::spawn(run_queue(
            rx,
            store,
            platform,
            timing,
            waiting.clone(),
            cancel_token.clone(),
        ));

        Self {
            tx,
            waiting,
            cancel_token,
        }
    }

    /// Join the queue; the returned future resolves when it is this job's turn
    ///
    /// The position is taken when this method is called, not when the future
    /// is first polled. Resolves to [`Error::ShuttingDown`] if the queue is
    /// closed before the turn comes.
    pub fn enqueue(&self, job_id: JobId) -> impl Future<Output = Result<()>> + Send + 'static {
        let (release, turn) = oneshot::channel();
        let accepted = self.tx.send(TurnRequest { job_id, release }).is_ok();
        if accepted {
            let depth = self.waiting.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(job_id = job_id.0, depth, "Job joined serialized queue");
        }

        async move {
            if !accepted {
                return Err(Error::ShuttingDown);
            }
            turn.await.map_err(|_| Error::ShuttingDown)
        }
    }

    /// Number of jobs waiting for their turn
    pub fn len(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Whether no job is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the actor; waiting jobs resolve to [`Error::ShuttingDown`]
    pub fn close(&self) {
        self.cancel_token.cancel();
    }
}

async fn run_queue(
    mut rx: mpsc::UnboundedReceiver<TurnRequest>,
    store: Arc<dyn JobStore>,
    platform: Platform,
    timing: QueueTiming,
    waiting: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
) {
    let mut last_dispatch: Option<Instant> = None;

    loop {
        let request = tokio::select! {
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
            _ = cancel_token.cancelled() => break,
        };
        let job_id = request.job_id;

        let wait = last_dispatch
            .map(|last| timing.min_delay.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO);

        let advised = !wait.is_zero();
        if advised {
            let message = format!(
                "Waiting {}s before contacting {} to avoid rate limiting",
                wait.as_secs_f64().ceil() as u64,
                platform
            );
            tracing::debug!(job_id = job_id.0, wait_ms = wait.as_millis() as u64, "Spacing serialized dispatch");
            if let Err(e) = store.update(job_id, &JobPatch::advisory(message)).await {
                tracing::error!(job_id = job_id.0, error = %e, "Failed to record queue wait");
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel_token.cancelled() => break,
            }

            if let Err(e) = store.update(job_id, &JobPatch::clear_advisory()).await {
                tracing::error!(job_id = job_id.0, error = %e, "Failed to clear queue wait message");
            }
        }

        last_dispatch = Some(Instant::now());
        waiting.fetch_sub(1, Ordering::SeqCst);
        if request.release.send(()).is_err() {
            tracing::debug!(job_id = job_id.0, "Queued job gave up its turn");
        } else {
            tracing::info!(job_id = job_id.0, platform = %platform, "Released serialized job");
        }

        tokio::select! {
            _ = tokio::time::sleep(timing.inter_item_delay) => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    tracing::debug!("Serialized queue stopped");
}
