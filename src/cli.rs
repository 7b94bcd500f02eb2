use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{validate_url, Job, Store, TargetUrl, UrlSource};

#[derive(Parser)]
#[command(name = "snapqueue")]
#[command(about = "Background page-capture job worker")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Input file with URLs to enqueue (one per line)")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Poll interval in seconds")]
    pub poll_interval: Option<u64>,

    #[arg(long, help = "Maximum concurrent capture jobs")]
    pub max_concurrent: Option<usize>,

    #[arg(long, help = "Retry limit per job")]
    pub retry_limit: Option<u32>,

    #[arg(long, help = "Output root directory for captures")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

/// Enqueue one pending job per URL in the input file.
///
/// Lines that are empty or start with `#` are skipped; the rest must be
/// http(s) URLs. All seeded targets share a fresh collection id.
pub async fn seed_from_file(store: &dyn Store, path: &Path) -> anyhow::Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read input file {}", path.display()))?;

    let collection_id = Uuid::new_v4();
    let mut count = 0;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        validate_url(line).with_context(|| format!("invalid URL in input file: {line}"))?;

        let target = TargetUrl::new(line, collection_id, UrlSource::Manual);
        let job = Job::new(target.id);
        store.create_target_url(target).await?;
        store.create_job(job).await?;
        count += 1;
    }

    Ok(count)
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
