use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

use super::error::ChainError;

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// Single GET; retrying is the caller's business.
    pub async fn get_text(&self, url: &str) -> Result<String, ChainError> {
        debug!("GET {}", url);

        let network = |message: String| ChainError::Network {
            url: url.to_string(),
            message,
        };

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| network(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status}")));
        }

        resp.text()
            .await
            .map_err(|e| network(format!("failed to read response body: {e}")))
    }
}
