//! Retrying request layer.
//!
//! Every remote call goes through [`RetryingClient::request`]. The policy:
//!
//! - At most `retry.max_attempts` attempts, sleeping `base_delay * n`
//!   before attempt `n`
//! - Transport failures and 5xx responses are retried
//! - 4xx responses are terminal; 401 and 403 map to their own variants
//! - When attempts run out the last error is returned
//!
//! Retries block the calling thread. There is no background queue.

use crate::config::ClientConfig;
use crate::error::{RemoteResult, SyncError};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

/// Counters for requests sent through a [`RetryingClient`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Logical requests issued.
    pub requests: u64,
    /// HTTP attempts made, including retries.
    pub attempts: u64,
    /// Attempts that were retries.
    pub retries: u64,
    /// Requests that ended in an error.
    pub failures: u64,
}

/// Sends requests to the remote store with retries and authentication.
pub struct RetryingClient<C: HttpClient> {
    config: ClientConfig,
    client: C,
    stats: RwLock<RequestStats>,
}

impl<C: HttpClient> RetryingClient<C> {
    /// Creates a client. Fails with [`SyncError::Config`] on invalid settings.
    pub fn new(config: ClientConfig, client: C) -> RemoteResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            stats: RwLock::new(RequestStats::default()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &C {
        &self.client
    }

    /// Returns a snapshot of the request counters.
    pub fn stats(&self) -> RequestStats {
        self.stats.read().clone()
    }

    /// Sends a request to `path` (relative to the API URL) and decodes the
    /// JSON response. An empty body decodes as an empty object.
    pub fn request(&self, method: Method, path: &str, body: Option<&Value>) -> RemoteResult<Value> {
        self.request_with_query(method, path, &[], body)
    }

    /// Like [`request`](Self::request), with query parameters.
    pub fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> RemoteResult<Value> {
        let request = self.build(method, path, query, body, self.config.timeout);
        let result = self.execute(&request);
        if result.is_err() {
            self.stats.write().failures += 1;
        }
        result
    }

    /// Checks connectivity and credentials with a single lightweight read.
    ///
    /// Uses the probe timeout and is not retried, so a bad configuration
    /// fails fast.
    pub fn probe(&self, path: &str) -> RemoteResult<()> {
        let request = self.build(
            Method::Get,
            path,
            &[("limit", "1")],
            None,
            self.config.probe_timeout,
        );
        {
            let mut stats = self.stats.write();
            stats.requests += 1;
            stats.attempts += 1;
        }
        debug!(url = %request.url, "probing remote store");
        let result = self.client.send(&request).and_then(decode);
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.stats.write().failures += 1;
                warn!(error = %e, "connectivity probe failed");
                Err(e)
            }
        }
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        timeout: std::time::Duration,
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{}", self.config.api_url, path),
            bearer: self.config.api_key.clone(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.cloned(),
            timeout,
        }
    }

    fn execute(&self, request: &HttpRequest) -> RemoteResult<Value> {
        let retry = &self.config.retry;
        let mut last_error = None;

        self.stats.write().requests += 1;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                if let Some(err) = &last_error {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                }
                std::thread::sleep(delay);
                self.stats.write().retries += 1;
            }

            self.stats.write().attempts += 1;
            debug!(method = %request.method, url = %request.url, attempt = attempt + 1, "sending request");

            match self.client.send(request).and_then(decode) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::Config("no request attempts made".into())))
    }
}

/// Turns a raw response into JSON or a classified error.
fn decode(response: HttpResponse) -> RemoteResult<Value> {
    if !response.is_success() {
        return Err(SyncError::from_status(response.status, response.body));
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| SyncError::Decode(format!("invalid JSON response: {}", e)))
}
