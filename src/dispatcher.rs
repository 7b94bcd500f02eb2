//! Polling dispatcher: discovers pending jobs and fans them out under a
//! concurrency ceiling.
//!
//! A single loop owns the tick timer, so ticks can never overlap and the
//! in-flight accounting stays consistent. Each dispatched job holds an RAII
//! slot guard; the guard's drop decrements the active count even if the
//! executor task panics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::{Config, JobExecutor, JobStatus, Metrics, Store};

pub struct Dispatcher {
    store: Arc<dyn Store>,
    executor: Arc<JobExecutor>,
    config: Config,
    active: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

struct SlotGuard {
    active: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        self.metrics.active_jobs.set(remaining as f64);
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<JobExecutor>,
        config: Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            active: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// One poll cycle: claim up to the number of free slots, oldest first,
    /// and start an executor task per job without waiting for completion.
    pub async fn tick(&self) {
        let active = self.active.load(Ordering::SeqCst);
        let available = self.config.max_concurrent.saturating_sub(active);
        if available == 0 {
            return;
        }

        let jobs = match self
            .store
            .fetch_oldest_by_status(JobStatus::Pending, available)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to poll for pending jobs");
                return;
            }
        };
        if jobs.is_empty() {
            return;
        }

        debug!(count = jobs.len(), active, "dispatching jobs");
        for job in jobs {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.metrics.active_jobs.set(now_active as f64);
            self.metrics.jobs_dispatched.increment(1);

            let guard = SlotGuard {
                active: self.active.clone(),
                metrics: self.metrics.clone(),
            };
            let executor = self.executor.clone();
            tokio::spawn(async move {
                let _slot = guard;
                executor.run(job.id).await;
            });
        }
    }

    /// Run the poll loop until a shutdown signal arrives, then drain.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            poll_interval = ?self.config.poll_interval,
            max_concurrent = self.config.max_concurrent,
            "dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("shutdown signal received, no further jobs will be dispatched");
                    break;
                }
            }
        }

        self.drain().await;
    }

    /// Block until every in-flight job finishes. No hard timeout: jobs are
    /// never forcibly cancelled.
    pub async fn drain(&self) {
        loop {
            let active = self.active.load(Ordering::SeqCst);
            if active == 0 {
                break;
            }
            info!(active, "waiting for in-flight jobs to complete");
            sleep(Duration::from_secs(1)).await;
        }
        info!("dispatcher drained");
    }
}
