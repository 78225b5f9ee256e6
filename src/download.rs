use crate::error::{FuncvmError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound on the buffer reserved from an advertised Content-Length.
const MAX_PREALLOCATION: u64 = 256 << 20;

/// Retrieves archive bytes for installation.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch_archive(&self, url: &str) -> Result<Vec<u8>>;
}

/// Remaining-time estimate that only reports changes.
#[derive(Debug, Default)]
pub struct EtaTracker {
    last: Option<String>,
}

impl EtaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Human-readable time left, or `None` when it matches the previous
    /// emission or cannot be estimated yet.
    pub fn observe(&mut self, downloaded: u64, total: u64, elapsed: Duration) -> Option<String> {
        let eta = estimate_remaining(downloaded, total, elapsed)?;
        let eta = HumanDuration(eta).to_string();

        if self.last.as_deref() == Some(eta.as_str()) {
            return None;
        }
        self.last = Some(eta.clone());
        Some(eta)
    }
}

fn estimate_remaining(downloaded: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if total == 0 || downloaded == 0 || elapsed.is_zero() {
        return None;
    }

    let rate = downloaded as f64 / elapsed.as_secs_f64();
    let left = total.saturating_sub(downloaded) as f64;
    Some(Duration::from_secs_f64(left / rate))
}

/// Buffer size to reserve for an advertised Content-Length.
fn preallocation(content_length: u64) -> usize {
    usize::try_from(content_length.min(MAX_PREALLOCATION)).unwrap_or(0)
}

pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .build()?,
        })
    }
}

#[async_trait]
impl ArchiveSource for Downloader {
    /// Download into memory with progress indication
    async fn fetch_archive(&self, url: &str) -> Result<Vec<u8>> {
        let failed = |e: reqwest::Error| FuncvmError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(failed)?;

        let total_size = response.content_length().unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!(
            "Downloading {}",
            url.rsplit('/').next().unwrap_or("archive")
        ));

        let started = Instant::now();
        let mut eta = EtaTracker::new();
        let mut bytes = Vec::with_capacity(preallocation(total_size));
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(failed)?;
            bytes.extend_from_slice(&chunk);
            pb.set_position(bytes.len() as u64);

            if let Some(remaining) = eta.observe(bytes.len() as u64, total_size, started.elapsed()) {
                debug!(%remaining, "download progress");
                pb.set_message(format!("{} remaining", remaining));
            }
        }

        pb.finish_with_message("Download complete");
        Ok(bytes)
    }
}
