//! Retried HTTP fetches against the rendezvous authority.
//!
//! Every fetch runs up to `1 + max_retries` attempts with exponential
//! backoff (2^attempt seconds, capped) between them. After exhaustion the
//! caller gets a [`DownloadError`] carrying the last failure reason.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::error::{download_io_err, DownloadError};

/// Cap on the exponential backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(32);

/// HTTP transport with a shared agent, per-request timeout, and retry policy.
#[derive(Clone)]
pub struct Transport {
    agent: ureq::Agent,
    max_retries: u32,
}

impl Transport {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, max_retries }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.download_timeout),
            config.max_retries,
        )
    }

    /// Fetch a URL as trimmed UTF-8 text.
    pub fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        self.with_retries(url, |response| {
            response
                .into_string()
                .map(|body| body.trim().to_string())
                .map_err(|e| format!("failed to read body: {e}"))
        })
    }

    /// Fetch a URL as raw bytes.
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.with_retries(url, |response| {
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| format!("failed to read body: {e}"))?;
            Ok(bytes)
        })
    }

    /// Fetch a URL and write the body to `path`, creating parent directories.
    ///
    /// A zero-length body is rejected before anything is written.
    pub fn download_to(&self, url: &str, path: &Path) -> Result<(), DownloadError> {
        let bytes = self.fetch_bytes(url)?;
        if bytes.is_empty() {
            return Err(DownloadError::EmptyBody {
                url: url.to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| download_io_err(parent, e))?;
        }
        std::fs::write(path, &bytes).map_err(|e| download_io_err(path, e))?;

        tracing::debug!(url, path = %path.display(), bytes = bytes.len(), "download complete");
        Ok(())
    }

    fn with_retries<T>(
        &self,
        url: &str,
        read: impl Fn(ureq::Response) -> Result<T, String>,
    ) -> Result<T, DownloadError> {
        let attempts = self.max_retries + 1;
        let mut last_reason = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                tracing::debug!(url, attempt, delay_secs = delay.as_secs(), "retrying fetch");
                std::thread::sleep(delay);
            }

            match self.agent.get(url).call() {
                Ok(response) => match read(response) {
                    Ok(value) => return Ok(value),
                    Err(reason) => last_reason = reason,
                },
                Err(ureq::Error::Status(code, _)) => {
                    last_reason = format!("HTTP status {code}");
                }
                Err(ureq::Error::Transport(err)) => {
                    last_reason = err.to_string();
                }
            }
        }

        Err(DownloadError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            reason: last_reason,
        })
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(5)).min(MAX_BACKOFF)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
