//! Storage Node Transfers
//!
//! The tracker only hands out storage URLs; the file bytes move over plain
//! HTTP. `Transfer` is the seam the client uses for that leg.

use bytes::Bytes;
use std::future::Future;
use std::time::Duration;

use crate::errors::{MogileError, Result};

/// Moves file content to and from storage node URLs
pub trait Transfer: Send + Sync {
    /// Fetches the whole content behind `url`
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;

    /// Writes `body` to `url`
    fn put(&self, url: &str, body: Bytes) -> impl Future<Output = Result<()>> + Send;
}

/// `Transfer` over HTTP with `reqwest`
#[derive(Clone)]
pub struct HttpTransfer {
    http: reqwest::Client,
}

impl HttpTransfer {
    /// Creates a transfer whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MogileError::InvalidArgument(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self::from_client(http))
    }

    /// Wraps an existing `reqwest` client
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn http_error(url: &str, e: reqwest::Error) -> MogileError {
    MogileError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

impl Transfer for HttpTransfer {
    async fn get(&self, url: &str) -> Result<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(url, e))?;
        response.bytes().await.map_err(|e| http_error(url, e))
    }

    async fn put(&self, url: &str, body: Bytes) -> Result<()> {
        self.http
            .put(url)
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(url, e))?;
        Ok(())
    }
}
