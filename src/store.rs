//! Store boundary consumed by the dispatcher and executor.
//!
//! The persistent store lives behind the [`Store`] trait; every mutation is
//! a single-entity atomic operation, and the conditional job update is the
//! sole concurrency guard between racing executors. `MemoryStore` is the
//! in-process implementation used by the binary and the tests.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::{Job, JobStatus, Screenshot, StoreError, TargetUrl};

/// Tri-state field patch for partial updates
///
/// Distinguishes "leave the stored value alone" from "clear it", which an
/// `Option` alone cannot express.
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn apply(self, field: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *field = None,
            Patch::Set(value) => *field = Some(value),
        }
    }
}

/// Partial update applied to a job under a status precondition
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub bump_attempts: bool,
    pub last_error: Patch<String>,
}

/// Partial update applied to a target URL
#[derive(Debug, Clone)]
pub struct TargetUrlUpdate {
    pub status: JobStatus,
    pub error_message: Patch<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_target_url(&self, target: TargetUrl) -> Result<(), StoreError>;

    async fn create_job(&self, job: Job) -> Result<(), StoreError>;

    async fn create_screenshot(&self, screenshot: Screenshot) -> Result<(), StoreError>;

    async fn job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    async fn target_url(&self, id: Uuid) -> Result<Option<TargetUrl>, StoreError>;

    /// Fetch up to `limit` jobs with the given status, oldest created first.
    async fn fetch_oldest_by_status(
        &self,
        status: JobStatus,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError>;

    /// Apply `update` only if the job's current status equals `expected`.
    ///
    /// Returns the updated job, or `None` when the job is missing or the
    /// precondition failed (another executor already transitioned it). The
    /// read-check-write must be atomic per entity.
    async fn update_job_if_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Option<Job>, StoreError>;

    async fn update_target_url(
        &self,
        id: Uuid,
        update: TargetUrlUpdate,
    ) -> Result<(), StoreError>;
}

/// In-process store backed by sharded concurrent maps
///
/// `DashMap::get_mut` holds the entry's shard lock for the duration of the
/// mutation, which makes `update_job_if_status` an atomic compare-and-update
/// without any table-wide locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: DashMap<Uuid, Job>,
    target_urls: DashMap<Uuid, TargetUrl>,
    screenshots: DashMap<Uuid, Screenshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screenshots referencing a target URL, unordered. Test/reporting helper.
    pub fn screenshots_for_target(&self, target_url_id: Uuid) -> Vec<Screenshot> {
        self.screenshots
            .iter()
            .filter(|entry| entry.target_url_id == target_url_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn job_count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|entry| entry.status == status).count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_target_url(&self, target: TargetUrl) -> Result<(), StoreError> {
        if self.target_urls.contains_key(&target.id) {
            return Err(StoreError::DuplicateRecord(target.id));
        }
        self.target_urls.insert(target.id, target);
        Ok(())
    }

    async fn create_job(&self, job: Job) -> Result<(), StoreError> {
        if self.jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateRecord(job.id));
        }
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn create_screenshot(&self, screenshot: Screenshot) -> Result<(), StoreError> {
        if self.screenshots.contains_key(&screenshot.id) {
            return Err(StoreError::DuplicateRecord(screenshot.id));
        }
        self.screenshots.insert(screenshot.id, screenshot);
        Ok(())
    }

    async fn job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn target_url(&self, id: Uuid) -> Result<Option<TargetUrl>, StoreError> {
        Ok(self.target_urls.get(&id).map(|entry| entry.value().clone()))
    }

    async fn fetch_oldest_by_status(
        &self,
        status: JobStatus,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError> {
        let mut matching: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();

        // id as tiebreaker keeps the order stable for equal timestamps
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn update_job_if_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Option<Job>, StoreError> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != expected {
            return Ok(None);
        }
        if let Some(status) = update.status {
            entry.status = status;
        }
        if update.bump_attempts {
            entry.attempts += 1;
        }
        update.last_error.apply(&mut entry.last_error);
        Ok(Some(entry.value().clone()))
    }

    async fn update_target_url(
        &self,
        id: Uuid,
        update: TargetUrlUpdate,
    ) -> Result<(), StoreError> {
        let Some(mut entry) = self.target_urls.get_mut(&id) else {
            return Err(StoreError::TargetUrlNotFound(id));
        };
        entry.status = update.status;
        update.error_message.apply(&mut entry.error_message);
        Ok(())
    }
}
