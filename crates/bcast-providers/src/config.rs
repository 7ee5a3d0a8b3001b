//! Provider endpoints and credentials.

use std::time::Duration;

use crate::error::ProviderResult;
use crate::job::PollConfig;

/// Credentials and base URLs for every generation provider.
///
/// Keys are optional so the worker can start with a partial set; building a
/// provider whose key is missing fails with `MissingCredentials`.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub segmind_api_key: Option<String>,
    pub segmind_base_url: String,
    /// Per-request timeout for provider HTTP calls.
    pub http_timeout: Duration,
    pub poll: PollConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            replicate_api_token: None,
            replicate_base_url: "https://api.replicate.com".to_string(),
            segmind_api_key: None,
            segmind_base_url: "https://api.segmind.com".to_string(),
            http_timeout: Duration::from_secs(120),
            poll: PollConfig::default(),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let poll_defaults = PollConfig::default();
        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            replicate_api_token: non_empty("REPLICATE_API_TOKEN"),
            replicate_base_url: non_empty("REPLICATE_BASE_URL")
                .unwrap_or(defaults.replicate_base_url),
            segmind_api_key: non_empty("SEGMIND_API_KEY"),
            segmind_base_url: non_empty("SEGMIND_BASE_URL").unwrap_or(defaults.segmind_base_url),
            http_timeout: Duration::from_secs(
                non_empty("PROVIDER_HTTP_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            poll: PollConfig {
                interval: Duration::from_millis(
                    non_empty("PROVIDER_POLL_INTERVAL_MS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(poll_defaults.interval.as_millis() as u64),
                ),
                timeout: Duration::from_secs(
                    non_empty("PROVIDER_POLL_TIMEOUT_SECS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(poll_defaults.timeout.as_secs()),
                ),
                status_retries: non_empty("PROVIDER_STATUS_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(poll_defaults.status_retries),
            },
        }
    }

    pub fn http_client(&self) -> ProviderResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("bcast/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}
