use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("target url {0} not found")]
    TargetUrlNotFound(Uuid),

    #[error("record {0} already exists")]
    DuplicateRecord(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("page error: {0}")]
    PageError(String),

    #[error("screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl From<image::ImageError> for WorkerError {
    fn from(err: image::ImageError) -> Self {
        WorkerError::ImageError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for WorkerError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        WorkerError::PageError(err.to_string())
    }
}
