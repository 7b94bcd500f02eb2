//! Job executor: claims one job, runs the capture, applies the retry policy.
//!
//! State machine per job:
//! - `Pending → Running → Done` on capture success
//! - `Pending → Running → Pending` on capture failure with attempts left
//! - `Pending → Running → Failed` on capture failure at the retry limit
//! - any bookkeeping error marks the job `Failed` directly, bypassing the
//!   retry counter
//!
//! The claim is a conditional status update and the sole concurrency guard:
//! when two dispatch ticks race on the same job, exactly one claim succeeds.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain_directory, generate_slug, CaptureOutcome, Capturer, Config, Job, JobStatus, JobUpdate,
    Metrics, Patch, Screenshot, Store, StoreError, TargetUrl, TargetUrlUpdate, WorkerError,
};

pub struct JobExecutor {
    store: Arc<dyn Store>,
    capturer: Arc<dyn Capturer>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        capturer: Arc<dyn Capturer>,
        config: Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            capturer,
            config,
            metrics,
        }
    }

    /// Execute one job to a terminal or re-queued state.
    ///
    /// Never propagates errors: capture failures feed the retry policy, and
    /// bookkeeping failures mark the job failed in place.
    pub async fn run(&self, job_id: Uuid) {
        if let Err(e) = self.process(job_id).await {
            error!(job = %job_id, error = %e, "job bookkeeping failed");
            self.metrics.jobs_failed.increment(1);
            self.fail_job_directly(job_id, &e).await;
        }
    }

    async fn process(&self, job_id: Uuid) -> Result<(), WorkerError> {
        let Some(job) = self.claim(job_id).await? else {
            debug!(job = %job_id, "job already claimed or completed");
            return Ok(());
        };

        let Some(target) = self.store.target_url(job.target_url_id).await? else {
            return Err(StoreError::TargetUrlNotFound(job.target_url_id).into());
        };
        self.store
            .update_target_url(
                target.id,
                TargetUrlUpdate {
                    status: JobStatus::Running,
                    error_message: Patch::Keep,
                },
            )
            .await?;

        let output_dir = self
            .config
            .output_root
            .join(target.collection_id.to_string())
            .join(domain_directory(&target.url));
        let slug = generate_slug(&target.url, Utc::now());

        info!(job = %job.id, url = %target.url, attempt = job.attempts, "processing capture job");
        let started = std::time::Instant::now();
        let outcome = self
            .capturer
            .capture(&target.url, &output_dir, &slug)
            .await;
        self.metrics
            .capture_duration
            .record(started.elapsed().as_secs_f64());

        match outcome {
            CaptureOutcome::Success { image_path, title } => {
                self.complete(&job, &target, image_path, title).await
            }
            CaptureOutcome::Failure { error } => self.handle_failure(&job, &target, error).await,
        }
    }

    /// Claim = atomic "set Running and bump attempts, only if still Pending".
    async fn claim(&self, job_id: Uuid) -> Result<Option<Job>, WorkerError> {
        let update = JobUpdate {
            status: Some(JobStatus::Running),
            bump_attempts: true,
            last_error: Patch::Keep,
        };
        Ok(self
            .store
            .update_job_if_status(job_id, JobStatus::Pending, update)
            .await?)
    }

    async fn complete(
        &self,
        job: &Job,
        target: &TargetUrl,
        image_path: std::path::PathBuf,
        title: Option<String>,
    ) -> Result<(), WorkerError> {
        self.store
            .create_screenshot(Screenshot {
                id: Uuid::new_v4(),
                collection_id: target.collection_id,
                target_url_id: target.id,
                image_path,
                title,
                url: target.url.clone(),
                captured_at: Utc::now(),
            })
            .await?;

        self.store
            .update_target_url(
                target.id,
                TargetUrlUpdate {
                    status: JobStatus::Done,
                    error_message: Patch::Clear,
                },
            )
            .await?;
        self.store
            .update_job_if_status(
                job.id,
                JobStatus::Running,
                JobUpdate {
                    status: Some(JobStatus::Done),
                    ..Default::default()
                },
            )
            .await?;

        self.metrics.jobs_done.increment(1);
        info!(job = %job.id, url = %target.url, "capture succeeded");
        Ok(())
    }

    async fn handle_failure(
        &self,
        job: &Job,
        target: &TargetUrl,
        error: String,
    ) -> Result<(), WorkerError> {
        if job.attempts < self.config.retry_limit {
            // Back to the queue; the implicit backoff is the poll interval.
            self.store
                .update_job_if_status(
                    job.id,
                    JobStatus::Running,
                    JobUpdate {
                        status: Some(JobStatus::Pending),
                        bump_attempts: false,
                        last_error: Patch::Set(error.clone()),
                    },
                )
                .await?;
            self.store
                .update_target_url(
                    target.id,
                    TargetUrlUpdate {
                        status: JobStatus::Pending,
                        error_message: Patch::Keep,
                    },
                )
                .await?;

            self.metrics.jobs_retried.increment(1);
            warn!(
                job = %job.id,
                url = %target.url,
                attempt = job.attempts,
                error = %error,
                "capture failed, retry scheduled"
            );
        } else {
            self.store
                .update_target_url(
                    target.id,
                    TargetUrlUpdate {
                        status: JobStatus::Failed,
                        error_message: Patch::Set(error.clone()),
                    },
                )
                .await?;
            self.store
                .update_job_if_status(
                    job.id,
                    JobStatus::Running,
                    JobUpdate {
                        status: Some(JobStatus::Failed),
                        bump_attempts: false,
                        last_error: Patch::Set(error.clone()),
                    },
                )
                .await?;

            self.metrics.jobs_failed.increment(1);
            warn!(
                job = %job.id,
                url = %target.url,
                attempts = job.attempts,
                error = %error,
                "capture failed permanently"
            );
        }
        Ok(())
    }

    /// Terminal failure for bookkeeping errors, skipping the retry policy.
    ///
    /// The job is normally Running at this point; Pending covers the case
    /// where the claim itself was the operation that failed mid-way.
    async fn fail_job_directly(&self, job_id: Uuid, cause: &WorkerError) {
        let update = JobUpdate {
            status: Some(JobStatus::Failed),
            bump_attempts: false,
            last_error: Patch::Set(cause.to_string()),
        };
        for expected in [JobStatus::Running, JobStatus::Pending] {
            match self
                .store
                .update_job_if_status(job_id, expected, update.clone())
                .await
            {
                Ok(Some(_)) => return,
                Ok(None) => continue,
                Err(e) => {
                    error!(job = %job_id, error = %e, "failed to record job failure");
                    return;
                }
            }
        }
        debug!(job = %job_id, "job already terminal, failure not recorded");
    }
}
