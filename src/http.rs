//! HTTP client for downloading device activity files.
//!
//! One GET per file with a bearer token. Non-2xx responses become
//! [`IngestError::DownloadFailed`] carrying the status; there is no retry at
//! this layer.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::fit::{parse_fit_activity_with_config, ParsedFitActivity, TransformConfig};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    /// Whole-request timeout
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Applied by [`ActivityFileClient::fetch_activity`]
    pub transform: TransformConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("activity-core/", env!("CARGO_PKG_VERSION")).to_string(),
            transform: TransformConfig::default(),
        }
    }
}

/// Downloads activity files from a device vendor's file endpoint.
///
/// Holds no per-download state; one client can serve concurrent downloads.
pub struct ActivityFileClient {
    client: Client,
    config: DownloadConfig,
}

impl ActivityFileClient {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Fetch the raw bytes behind `url`.
    pub async fn download(&self, url: &str, bearer_token: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        debug!("[ActivityDownload] GET {}", url);

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", bearer_token))
            .send()
            .await
            .map_err(|e| {
                warn!("[ActivityDownload] GET {} failed: {}", url, e);
                IngestError::Request {
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[ActivityDownload] GET {} -> {}", url, status.as_u16());
            return Err(IngestError::DownloadFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            warn!("[ActivityDownload] reading body of {} failed: {}", url, e);
            IngestError::Request {
                message: e.to_string(),
            }
        })?;

        info!(
            "[ActivityDownload] {} bytes from {} in {:.2}s",
            bytes.len(),
            url,
            start.elapsed().as_secs_f64()
        );
        Ok(bytes.to_vec())
    }

    /// Download, decode and normalize an activity file.
    pub async fn fetch_activity(&self, url: &str, bearer_token: &str) -> Result<ParsedFitActivity> {
        let bytes = self.download(url, bearer_token).await?;
        parse_fit_activity_with_config(&bytes, &self.config.transform)
    }
}

/// Blocking wrapper for hosts without an async runtime.
pub fn fetch_activity_blocking(
    config: DownloadConfig,
    url: &str,
    bearer_token: &str,
) -> Result<ParsedFitActivity> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| IngestError::Request {
        message: format!("Failed to create tokio runtime: {}", e),
    })?;
    let client = ActivityFileClient::new(config)?;
    rt.block_on(client.fetch_activity(url, bearer_token))
}
