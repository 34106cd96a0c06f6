use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::Fetcher;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

/// Fetches asset bytes with bounded retries.
///
/// A 404 or an empty 2xx body is a definitive answer and returns `Ok(None)`
/// without retrying.
/// Transport errors and other error statuses are retried up to `max_retries`
/// attempts in total; after that the result is `Ok(None)` when `skip_failed`
/// is set, otherwise [`DownloadError::Exhausted`].
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    max_retries: u32,
    skip_failed: bool,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, max_retries: u32, skip_failed: bool) -> Self {
        Self {
            fetcher,
            max_retries: max_retries.max(1),
            skip_failed,
        }
    }

    pub async fn download(&self, url: &str) -> Result<Option<Vec<u8>>, DownloadError> {
        let mut last = String::new();
        for attempt in 1..=self.max_retries {
            match self.fetcher.get(url).await {
                Ok(res) if res.is_not_found() => {
                    debug!(url, "not found; skipping");
                    return Ok(None);
                }
                Ok(res) if res.is_success() && res.body.is_empty() => {
                    debug!(url, "empty body; skipping");
                    return Ok(None);
                }
                Ok(res) if res.is_success() => return Ok(Some(res.body)),
                Ok(res) => {
                    last = format!("HTTP {}", res.status);
                }
                Err(err) => {
                    last = err.to_string();
                }
            }
            debug!(url, attempt, error = %last, "download attempt failed");
        }

        if self.skip_failed {
            warn!(url, attempts = self.max_retries, error = %last, "download failed; skipping");
            Ok(None)
        } else {
            Err(DownloadError::Exhausted {
                url: url.to_string(),
                attempts: self.max_retries,
                last,
            })
        }
    }
}
