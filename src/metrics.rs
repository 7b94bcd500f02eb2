use metrics::{Counter, Gauge, Histogram};

pub struct Metrics {
    pub jobs_dispatched: Counter,
    pub jobs_done: Counter,
    pub jobs_failed: Counter,
    pub jobs_retried: Counter,
    pub active_jobs: Gauge,
    pub capture_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            jobs_dispatched: Counter::noop(),
            jobs_done: Counter::noop(),
            jobs_failed: Counter::noop(),
            jobs_retried: Counter::noop(),
            active_jobs: Gauge::noop(),
            capture_duration: Histogram::noop(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
