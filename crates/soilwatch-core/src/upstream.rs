use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, UpstreamSettings};

/// Upstream bodies are trimmed to this many characters before being surfaced.
pub const BODY_SNIPPET_CHARS: usize = 512;

/// `from` parameter layout expected by the readings API.
pub const FROM_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything that can hand back the raw CSV export for a sensor.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch_csv(&self, sensor: &str, from: DateTime<Utc>) -> Result<String, FetchError>;
}

/// Client for the IrriMAX Live `getreadings` endpoint.
#[derive(Debug, Clone)]
pub struct IrrimaxClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IrrimaxClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, ConfigError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ReadingSource for IrrimaxClient {
    async fn fetch_csv(&self, sensor: &str, from: DateTime<Utc>) -> Result<String, FetchError> {
        let from = from.format(FROM_FORMAT).to_string();
        debug!(sensor, from = %from, "requesting readings");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("cmd", "getreadings"),
                ("key", self.api_key.as_str()),
                ("name", sensor),
                ("from", from.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(sensor, status = status.as_u16(), "upstream rejected readings request");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        Ok(body)
    }
}

pub fn body_snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let settings = UpstreamSettings {
            api_key: Some("   ".to_string()),
            ..UpstreamSettings::default()
        };
        assert!(matches!(
            IrrimaxClient::new(&settings),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        let body = "é".repeat(BODY_SNIPPET_CHARS + 10);
        let snippet = body_snippet(&body);
        assert_eq!(snippet.chars().count(), BODY_SNIPPET_CHARS);
    }
}
