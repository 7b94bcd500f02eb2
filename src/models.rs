//! Domain records shared between the dispatcher, executor, and store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle status shared by jobs and target URLs
///
/// `Done` and `Failed` are terminal; nothing transitions a record out of
/// them. A `TargetUrl` mirrors the status of its most recent job, written
/// by the executor only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// How a target URL entered the system (outside the worker's concern,
/// carried on the record for the CRUD layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UrlSource {
    Auto,
    Manual,
}

/// One scheduled attempt lifecycle to capture a target URL
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub target_url_id: Uuid,
    pub status: JobStatus,
    /// Monotonic: incremented exactly once per claimed execution
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Dispatch order key: oldest pending job runs first
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(target_url_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_url_id,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}

/// A URL to be captured, exposing externally visible aggregate status
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetUrl {
    pub id: Uuid,
    pub url: String,
    pub collection_id: Uuid,
    pub status: JobStatus,
    /// Set on terminal failure, cleared on success
    pub error_message: Option<String>,
    pub source: UrlSource,
}

impl TargetUrl {
    pub fn new(url: impl Into<String>, collection_id: Uuid, source: UrlSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            collection_id,
            status: JobStatus::Pending,
            error_message: None,
            source,
        }
    }
}

/// Immutable result record of a successful capture
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Screenshot {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub target_url_id: Uuid,
    pub image_path: PathBuf,
    pub title: Option<String>,
    pub url: String,
    pub captured_at: DateTime<Utc>,
}
