//! HTTP transport.
//!
//! The network is abstracted behind [`HttpClient`] so the retry layer and
//! the record store can be exercised without a server. [`ReqwestClient`] is
//! the production implementation; [`ScriptedHttpClient`] replays canned
//! responses for tests.

use crate::error::{RemoteResult, SyncError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP methods used by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully resolved outgoing request.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Bearer credential.
    pub bearer: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A raw response: status and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status, and [`SyncError::Connectivity`] when none did.
pub trait HttpClient: Send + Sync {
    /// Sends one request, without retrying.
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        (**self).send(request)
    }
}

/// Blocking HTTP client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client.
    pub fn new() -> RemoteResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ctlsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .bearer_auth(&request.bearer)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::timeout(format!("request timed out: {}", err))
    } else {
        SyncError::connectivity(err.to_string())
    }
}

/// An HTTP client that replays queued responses in order.
///
/// Every request is recorded so tests can assert on attempts, URLs,
/// timeouts and bodies. An empty queue yields a connectivity error.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    replies: Mutex<VecDeque<RemoteResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    /// Creates a client with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with the given status and body.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queues a response with a JSON body.
    pub fn push_json(&self, status: u16, body: Value) {
        self.replies
            .lock()
            .push_back(Ok(HttpResponse::json(status, &body)));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, error: SyncError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of queued replies not yet consumed.
    pub fn pending(&self) -> usize {
        self.replies.lock().len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::connectivity("no scripted response")))
    }
}
