//! Configuration management with serde serialization/deserialization
//!
//! This module provides all configuration structures for the capture worker,
//! including the poll/retry policy, browser settings, capture timeouts, and
//! output image limits.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::WorkerError;

/// Main configuration structure for the capture worker
///
/// Controls the dispatcher's poll/concurrency policy, the per-job retry
/// limit, the capture pipeline's timeouts, and the image output limits.
///
/// # Examples
///
/// ```rust
/// use snapqueue::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     max_concurrent: 4,
///     retry_limit: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// How often the dispatcher polls the store for pending jobs (default: 3s)
    pub poll_interval: Duration,

    /// Maximum number of capture jobs running at once (default: 2)
    ///
    /// The dispatcher never starts more jobs than this; the pending backlog
    /// waits in the store until a slot frees.
    pub max_concurrent: usize,

    /// Maximum attempts before a job is terminally failed (default: 2)
    pub retry_limit: u32,

    /// Timeout for the initial page navigation (default: 60 seconds)
    ///
    /// Exceeding this fails the current attempt and feeds the retry policy.
    pub navigation_timeout: Duration,

    /// Best-effort wait for network idle after navigation (default: 10 seconds)
    ///
    /// Timing out here is tolerated; the capture continues.
    pub network_idle_timeout: Duration,

    /// Unconditional settle delay before readiness probes (default: 5 seconds)
    ///
    /// Gives deferred scripts a chance to run on pages that render late.
    pub settle_delay: Duration,

    /// Best-effort wait for loading indicators to disappear (default: 5 seconds)
    pub spinner_timeout: Duration,

    /// Browser viewport used for every capture
    pub viewport: Viewport,

    /// User-Agent string sent with every capture
    ///
    /// Defaults to a realistic desktop Chrome string; some sites serve
    /// degraded markup to obviously-headless agents.
    pub user_agent: String,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Root directory for captured images and metadata
    ///
    /// Captures land under `<output_root>/<collection_id>/<domain>/`.
    pub output_root: PathBuf,

    /// Size/dimension limits enforced on captured images
    pub image_limits: ImageLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_concurrent: 2,
            retry_limit: 2,
            navigation_timeout: Duration::from_secs(60),
            network_idle_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(5),
            spinner_timeout: Duration::from_secs(5),
            viewport: Viewport::default(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            chrome_path: None,
            output_root: PathBuf::from("data/collections"),
            image_limits: ImageLimits::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.poll_interval.is_zero() {
            return Err(WorkerError::ConfigurationError(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(WorkerError::ConfigurationError(
                "max concurrent jobs must be greater than 0".to_string(),
            ));
        }
        if self.retry_limit == 0 {
            return Err(WorkerError::ConfigurationError(
                "retry limit must be greater than 0".to_string(),
            ));
        }
        if self.navigation_timeout.is_zero() {
            return Err(WorkerError::ConfigurationError(
                "navigation timeout must be greater than 0".to_string(),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(WorkerError::ConfigurationError(
                "viewport dimensions must be greater than 0".to_string(),
            ));
        }
        self.image_limits.validate()
    }
}

/// Browser viewport used when rendering pages for capture
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1440)
    pub width: u32,

    /// Viewport height in pixels (default: 900)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// Limits applied to captured images before they are accepted
///
/// All four limits are independent; an image violating any of them is
/// resized and/or re-encoded by the optimizer.
///
/// # Examples
///
/// ```rust
/// use snapqueue::ImageLimits;
///
/// let limits = ImageLimits::default();
/// assert_eq!(limits.max_width, 8192);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageLimits {
    /// Maximum file size in megabytes (default: 30)
    pub max_file_size_mb: f64,

    /// Maximum image width in pixels (default: 8192)
    pub max_width: u32,

    /// Maximum image height in pixels (default: 4096)
    pub max_height: u32,

    /// Maximum total pixel count (default: 32,000,000)
    pub max_pixels: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_file_size_mb: 30.0,
            max_width: 8192,
            max_height: 4096,
            max_pixels: 32_000_000,
        }
    }
}

impl ImageLimits {
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.max_file_size_mb <= 0.0 {
            return Err(WorkerError::ConfigurationError(
                "max file size must be greater than 0".to_string(),
            ));
        }
        if self.max_width == 0 || self.max_height == 0 || self.max_pixels == 0 {
            return Err(WorkerError::ConfigurationError(
                "image dimension limits must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate Chrome command-line arguments for an isolated headless capture
///
/// Each invocation gets a unique user data directory so concurrent browser
/// instances never trip over Chrome's profile singleton.
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let unique_id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-agent={}", config.user_agent),
        format!("--user-data-dir=/tmp/snapqueue-profile-{unique_id}"),
    ]
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, String> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build()
}
