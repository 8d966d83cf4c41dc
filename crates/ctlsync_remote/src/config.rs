//! Configuration for the remote client.

use crate::error::{RemoteResult, SyncError};
use std::time::Duration;

/// Configuration for talking to the remote store.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base API URL, without a trailing slash.
    pub api_url: String,
    /// Static bearer credential.
    pub api_key: String,
    /// Timeout for normal requests.
    pub timeout: Duration,
    /// Timeout for the connectivity probe.
    pub probe_timeout: Duration,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that the required settings are present.
    pub fn validate(&self) -> RemoteResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(SyncError::Config("API key is not set".into()));
        }
        if self.api_url.trim().is_empty() {
            return Err(SyncError::Config("API URL is not set".into()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "API URL must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config("retry attempts must be at least 1".into()));
        }
        Ok(())
    }
}

// The credential stays out of debug output.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("probe_timeout", &self.probe_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay unit; the wait before attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
