use crate::config::StationConfig;
use crate::error::{AppError, FetchError};
use crate::reading::StationReading;
use async_trait::async_trait;
use tracing::trace;

/// Which station document to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Current,
    /// Daily summary, served under `{url}/m`.
    DailySummary,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StationSource: Send + Sync {
    async fn fetch(&self, endpoint: Endpoint) -> Result<StationReading, FetchError>;
}

pub struct StationClient {
    http: reqwest::Client,
    base_url: String,
}

impl StationClient {
    pub fn new(config: &StationConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.clone(),
        })
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        match endpoint {
            Endpoint::Current => self.base_url.clone(),
            Endpoint::DailySummary => format!("{}/m", self.base_url),
        }
    }
}

#[async_trait]
impl StationSource for StationClient {
    async fn fetch(&self, endpoint: Endpoint) -> Result<StationReading, FetchError> {
        let url = self.url_for(endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        trace!(url = %url, bytes = body.len(), "station responded");

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
