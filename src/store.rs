//! Job record store abstraction
//!
//! The orchestrator reads and writes job records only through [`JobStore`].
//! [`Database`] is the persistent implementation; [`MemoryJobStore`] keeps
//! records in process memory for embedding and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::db::Database;
use crate::error::Result;
use crate::types::{Job, JobId, JobPatch, NewJob};

/// Keyed storage of job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a record with a fresh, never reused id
    async fn create(&self, job: NewJob) -> Result<Job>;

    /// Fetch a record
    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Apply `patch` and return the updated record
    ///
    /// Returns `Ok(None)` when the record does not exist. An empty patch
    /// returns the record unchanged.
    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<Option<Job>>;

    /// The `limit` most recently created records, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>>;

    /// Remove a record; returns whether it existed
    async fn delete(&self, id: JobId) -> Result<bool>;
}

#[async_trait]
impl JobStore for Database {
    async fn create(&self, job: NewJob) -> Result<Job> {
        self.insert_job(&job).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.get_job(id).await
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<Option<Job>> {
        self.update_job(id, patch).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        self.list_recent_jobs(limit).await
    }

    async fn delete(&self, id: JobId) -> Result<bool> {
        self.delete_job(id).await
    }
}

/// In-memory job store
///
/// Ids come from a monotonically increasing counter, so deleted ids are
/// never handed out again.
#[derive(Debug)]
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<JobId, Job>>,
    next_id: AtomicI64,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Job> {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = Job {
            id,
            url: job.url,
            format: job.format,
            quality: job.quality,
            platform: job.platform,
            status: job.status,
            title: None,
            filename: None,
            file_size: None,
            download_url: None,
            metadata: None,
            error_message: None,
            created_at: chrono::Utc::now(),
        };
        self.jobs.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply_to(job);
        Ok(Some(job.clone()))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        // Ids increase with creation time, so reverse id order is newest first
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: JobId) -> Result<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::types::{JobStatus, MediaFormat};
    use std::sync::Arc;

    fn new_job(url: &str) -> NewJob {
        NewJob {
            url: url.to_string(),
            format: MediaFormat::Audio,
            quality: None,
            platform: Platform::SoundCloud,
            status: JobStatus::Processing,
        }
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = MemoryJobStore::new();

        let job = store.create(new_job("https://soundcloud.com/a/b")).await.unwrap();
        assert_eq!(job.id, JobId(1));
        assert_eq!(store.get(job.id).await.unwrap(), Some(job.clone()));

        let updated = store
            .update(job.id, &JobPatch::failed("nope"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, JobStatus::Failed);

        assert!(store.delete(job.id).await.unwrap());
        assert!(!store.delete(job.id).await.unwrap());
        assert!(store.get(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_missing_record_is_noop() {
        let store = MemoryJobStore::new();
        let result = store
            .update(JobId(5), &JobPatch::failed("late"))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_patch_returns_record_unchanged() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("https://soundcloud.com/a/b")).await.unwrap();

        let same = store
            .update(job.id, &JobPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same, job);
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let store = MemoryJobStore::new();
        let a = store.create(new_job("https://soundcloud.com/a/1")).await.unwrap();
        store.delete(a.id).await.unwrap();
        let b = store.create(new_job("https://soundcloud.com/a/2")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_limited() {
        let store = MemoryJobStore::new();
        for i in 0..4 {
            store
                .create(new_job(&format!("https://soundcloud.com/a/{i}")))
                .await
                .unwrap();
        }

        let recent = store.list_recent(2).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|j| j.id.0).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(MemoryJobStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(new_job(&format!("https://soundcloud.com/c/{i}")))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }
}
