//! Latest-version resolution against the release endpoint.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{BenchError, BenchResult};
use crate::settings::Settings;

/// Source of the latest engine version identifier.
///
/// A trait seam so the orchestrator can be driven by a fixed or
/// failing source in tests.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn fetch_latest(&self) -> BenchResult<String>;
}

/// Fetches the latest version token from a plain-text HTTP endpoint.
///
/// Deliberately never retries: the external tick cadence is the retry
/// schedule, and retrying inside a tick would break the silent
/// no-op-when-unchanged property operators rely on.
#[derive(Debug, Clone)]
pub struct HttpVersionResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionResolver {
    pub fn new(settings: &Settings) -> BenchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.fetch_connect_timeout())
            .timeout(settings.fetch_timeout())
            .build()?;
        Ok(Self {
            client,
            url: settings.version_url.clone(),
        })
    }
}

#[async_trait]
impl VersionSource for HttpVersionResolver {
    async fn fetch_latest(&self) -> BenchResult<String> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BenchError::Network {
                message: format!("HTTP {} fetching {}", status.as_u16(), self.url),
            });
        }

        let body = response.text().await?;
        let version = body.trim();
        if version.is_empty() {
            return Err(BenchError::Network {
                message: format!("empty version response from {}", self.url),
            });
        }

        debug!(version, "resolved latest engine version");
        Ok(version.to_string())
    }
}
