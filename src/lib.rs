//! # snapqueue
//!
//! A background job worker that captures full-page screenshots of queued
//! URLs. A polling dispatcher claims pending capture jobs from a shared
//! store and fans them out under a bounded concurrency ceiling; each job
//! drives a headless Chrome instance through a failure-tolerant capture
//! pipeline and an image-optimization pass, with bounded retries before a
//! job is terminally failed.
//!
//! ## Architecture
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | `Dispatcher` | Fixed-interval poll, FIFO claim of pending jobs, concurrency ceiling, graceful drain |
//! | `JobExecutor` | Atomic job claim, retry/terminal-failure policy, status bookkeeping |
//! | `CaptureEngine` | Browser lifecycle, navigation, readiness probes, banner dismissal, screenshot + metadata |
//! | `ImageOptimizer` | Two-stage dimension/pixel clamp and re-encode within fixed limits |
//! | `MemoryStore` | In-process `Store` implementation with atomic conditional updates |
//!
//! Every status transition in the store is a single-entity conditional
//! update; the conditional job claim is the only concurrency guard needed
//! between racing dispatch ticks. One job's failure never affects sibling
//! jobs or the poll loop's liveness.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapqueue::{
//!     CaptureEngine, Capturer, Config, Dispatcher, Job, JobExecutor, MemoryStore, Metrics,
//!     Store, TargetUrl, UrlSource,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//!
//!     let target = TargetUrl::new("https://example.com", uuid::Uuid::new_v4(), UrlSource::Manual);
//!     let job = Job::new(target.id);
//!     store.create_target_url(target).await?;
//!     store.create_job(job).await?;
//!
//!     let metrics = Arc::new(Metrics::new());
//!     let capturer: Arc<dyn Capturer> = Arc::new(CaptureEngine::new(config.clone()));
//!     let executor = Arc::new(JobExecutor::new(store.clone(), capturer, config.clone(), metrics.clone()));
//!     let dispatcher = Dispatcher::new(store, executor, config, metrics);
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//!     dispatcher.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! snapqueue --input urls.txt --output data/collections --max-concurrent 2
//! ```

/// Configuration and settings for the capture worker
pub mod config;

/// Error types for the worker and the store boundary
pub mod error;

/// Domain records: jobs, target URLs, screenshots
pub mod models;

/// Store trait and the in-process implementation
pub mod store;

/// Capture engine driving the headless browser pipeline
pub mod capture;

/// Image optimization within size/dimension limits
pub mod optimizer;

/// Per-job execution and retry state machine
pub mod executor;

/// Polling dispatcher and concurrency ceiling
pub mod dispatcher;

/// Command-line interface and queue seeding
pub mod cli;

/// Performance metrics handles
pub mod metrics;

/// URL, slug, and formatting helpers
pub mod utils;


pub use capture::*;
pub use cli::*;
pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use executor::*;
pub use metrics::*;
pub use models::*;
pub use optimizer::*;
pub use store::*;
pub use utils::*;
