//! HTTP seam shared by the scraper and the downloader.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::config::Http;

/// Transport-level failures. HTTP error statuses are not errors here; they are
/// returned in [`FetchResponse::status`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn from_config(cfg: &Http) -> Result<Self> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let res = self.http.get(url).send().await.map_err(classify)?;
        let status = res.status().as_u16();
        let body = res.bytes().await.map_err(classify)?.to_vec();
        debug!(url, status, bytes = body.len(), "fetched");
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_status_helpers() {
        let ok = FetchResponse {
            status: 204,
            body: Vec::new(),
        };
        assert!(ok.is_success());
        assert!(!ok.is_not_found());

        let missing = FetchResponse {
            status: 404,
            body: b"gone".to_vec(),
        };
        assert!(!missing.is_success());
        assert!(missing.is_not_found());
        assert_eq!(missing.text(), "gone");
    }

    #[test]
    fn client_builds_from_config() {
        let cfg = crate::config::Config::builtin().unwrap();
        assert!(HttpFetcher::from_config(&cfg.http).is_ok());
    }
}
