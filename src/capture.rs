//! Capture engine driving headless Chrome through the page-capture pipeline.
//!
//! Given a URL, output directory, and slug, the engine launches an isolated
//! browser, navigates, runs a sequence of best-effort readiness probes,
//! captures a full-page screenshot plus a metadata sidecar, and hands the
//! image to the optimizer. It never lets an error cross its boundary:
//! callers always receive a structured [`CaptureOutcome`].

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::{create_browser_config, Config, ImageOptimizer, WorkerError};

/// Structured result of one capture attempt
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Success {
        image_path: PathBuf,
        title: Option<String>,
    },
    Failure {
        error: String,
    },
}

/// Seam between the job executor and the browser pipeline
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, url: &str, output_dir: &Path, slug: &str) -> CaptureOutcome;
}

/// Metadata persisted alongside every captured image
#[derive(Debug, Serialize)]
struct CaptureMetadata<'a> {
    url: &'a str,
    title: &'a Option<String>,
    captured_at: DateTime<Utc>,
}

// Matches visible elements whose class or id suggests an in-progress load.
const SPINNER_GONE_PREDICATE: &str = r#"
(() => {
  const nodes = document.querySelectorAll(
    '[class*="loading"], [class*="spinner"], [class*="loader"], [id*="loading"], [id*="spinner"]'
  );
  for (const el of nodes) {
    const style = window.getComputedStyle(el);
    if (style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0') {
      return false;
    }
  }
  return true;
})()
"#;

// Ordered heuristics: multilingual accept-button text first, then any
// visible button inside a cookie-ish container. Clicks at most one.
const CONSENT_DISMISS: &str = r#"
(() => {
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' &&
           rect.width > 0 && rect.height > 0;
  };
  const accepts = ['accept all', 'accept', 'agree', 'allow all', 'akzeptieren', 'accepter', '同意', '承諾'];
  const buttons = Array.from(document.querySelectorAll('button, [role="button"]'));
  for (const text of accepts) {
    const hit = buttons.find((b) => visible(b) && b.textContent.trim().toLowerCase().startsWith(text));
    if (hit) { hit.click(); return true; }
  }
  const contained = document.querySelectorAll('[class*="cookie"] button, [id*="cookie"] button');
  for (const b of contained) {
    if (visible(b)) { b.click(); return true; }
  }
  return false;
})()
"#;

pub struct CaptureEngine {
    config: Config,
    optimizer: ImageOptimizer,
}

impl CaptureEngine {
    pub fn new(config: Config) -> Self {
        let optimizer = ImageOptimizer::new(config.image_limits.clone());
        Self { config, optimizer }
    }

    async fn launch_browser(
        &self,
    ) -> Result<(Browser, tokio::task::JoinHandle<()>), WorkerError> {
        let browser_config =
            create_browser_config(&self.config).map_err(WorkerError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| WorkerError::BrowserLaunch(e.to_string()))?;

        // The handler drives CDP traffic and must be polled until the
        // browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "cdp handler error");
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    async fn run_pipeline(
        &self,
        url: &str,
        output_dir: &Path,
        slug: &str,
    ) -> Result<(PathBuf, Option<String>), WorkerError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let (mut browser, handler_task) = self.launch_browser().await?;

        // No early returns between here and the close calls below: the page
        // and browser are released on every exit path.
        let result = match browser.new_page("about:blank").await {
            Ok(page) => {
                let outcome = self.capture_on_page(&page, url, output_dir, slug).await;
                if let Err(e) = page.close().await {
                    debug!(error = %e, "page close failed");
                }
                outcome
            }
            Err(e) => Err(WorkerError::PageError(format!("failed to open page: {e}"))),
        };

        if let Err(e) = browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        handler_task.abort();

        result
    }

    async fn capture_on_page(
        &self,
        page: &Page,
        url: &str,
        output_dir: &Path,
        slug: &str,
    ) -> Result<(PathBuf, Option<String>), WorkerError> {
        let viewport = &self.config.viewport;
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(WorkerError::PageError)?;
        page.execute(metrics).await?;
        page.set_user_agent(self.config.user_agent.as_str()).await?;

        // Navigation is the only fatal step in the pipeline.
        match timeout(self.config.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(WorkerError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => return Err(WorkerError::NavigationTimeout(self.config.navigation_timeout)),
        }

        // Best-effort: wait for the network to go quiet.
        match timeout(self.config.network_idle_timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(url, error = %e, "network idle wait failed, continuing"),
            Err(_) => debug!(url, "network idle wait timed out, continuing"),
        }

        // Let deferred scripts run before probing readiness.
        sleep(self.config.settle_delay).await;

        self.wait_for_spinners_gone(page, url).await;
        self.dismiss_consent_banner(page, url).await;

        let title = page.get_title().await.ok().flatten().filter(|t| !t.is_empty());

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let data = page
            .screenshot(params)
            .await
            .map_err(|e| WorkerError::CaptureFailed(e.to_string()))?;

        let image_path = output_dir.join(format!("{slug}.png"));
        tokio::fs::write(&image_path, &data).await?;

        let metadata = CaptureMetadata {
            url,
            title: &title,
            captured_at: Utc::now(),
        };
        let meta_path = output_dir.join(format!("{slug}.json"));
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&metadata)?).await?;

        if let Err(e) = self.optimizer.optimize(&image_path) {
            warn!(url, error = %e, "image optimization failed, keeping original capture");
        }

        Ok((image_path, title))
    }

    /// Poll until no loading-indicator element is visible, bounded by the
    /// spinner timeout. Timing out or failing to evaluate is tolerated.
    async fn wait_for_spinners_gone(&self, page: &Page, url: &str) {
        let deadline = Instant::now() + self.config.spinner_timeout;
        loop {
            let gone = match page.evaluate(SPINNER_GONE_PREDICATE).await {
                Ok(result) => result.into_value::<bool>().unwrap_or(true),
                Err(e) => {
                    debug!(url, error = %e, "spinner probe failed, continuing");
                    return;
                }
            };
            if gone {
                return;
            }
            if Instant::now() >= deadline {
                debug!(url, "spinner probe timed out, continuing");
                return;
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// Try to click away a consent/cookie banner. At most one click; absence
    /// of any match is tolerated.
    async fn dismiss_consent_banner(&self, page: &Page, url: &str) {
        let clicked = match timeout(Duration::from_secs(1), page.evaluate(CONSENT_DISMISS)).await {
            Ok(Ok(result)) => result.into_value::<bool>().unwrap_or(false),
            Ok(Err(e)) => {
                debug!(url, error = %e, "consent banner probe failed, continuing");
                false
            }
            Err(_) => {
                debug!(url, "consent banner probe timed out, continuing");
                false
            }
        };
        if clicked {
            debug!(url, "dismissed consent banner");
            sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl Capturer for CaptureEngine {
    async fn capture(&self, url: &str, output_dir: &Path, slug: &str) -> CaptureOutcome {
        match self.run_pipeline(url, output_dir, slug).await {
            Ok((image_path, title)) => CaptureOutcome::Success { image_path, title },
            Err(e) => {
                warn!(url, error = %e, "capture attempt failed");
                CaptureOutcome::Failure {
                    error: e.to_string(),
                }
            }
        }
    }
}
