//! HTTP client for fetching player scripts

use crate::error::SigError;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches the text of a player script
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, SigError>;
}

/// Per-request options passed through to the fetcher
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Overrides the client timeout for this request
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_delay: Duration,
    /// User agent string
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// reqwest-backed player script fetcher
#[derive(Debug, Clone)]
pub struct PlayerClient {
    client: Client,
    config: HttpClientConfig,
}

impl PlayerClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self, SigError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, SigError> {
        let user_agent = config
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str, options: &FetchOptions) -> Result<String, SigError> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SigError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ScriptFetcher for PlayerClient {
    async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, SigError> {
        let mut attempt = 0;
        loop {
            debug!(
                "Fetching player script {} (attempt {}/{})",
                url,
                attempt + 1,
                self.config.max_retries + 1
            );

            match self.fetch_once(url, options).await {
                Ok(text) => {
                    debug!("Fetched player script ({} chars)", text.len());
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_delay * (1u32 << attempt);
                    warn!("Player script fetch failed: {}, retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
