//! Error types for remote operations.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Required settings are missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("connectivity error: {message}")]
    Connectivity {
        /// Error message.
        message: String,
        /// Whether the failure was a timeout.
        timed_out: bool,
    },

    /// The credential was rejected (401).
    #[error("invalid API credential, check the configured key")]
    AuthenticationFailed,

    /// The credential lacks permission (403).
    #[error("access forbidden, the API key may not have the required permissions")]
    Forbidden,

    /// A local precondition failed. Never sent to the remote store.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response.
    #[error("remote error {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The operation was cancelled before it started.
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a connectivity error for a timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Classifies a non-2xx status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => Self::AuthenticationFailed,
            403 => Self::Forbidden,
            _ => Self::Remote {
                status,
                body: body.into(),
            },
        }
    }

    /// Returns true if this error can be retried.
    ///
    /// Transport failures and 5xx responses are retryable; client errors
    /// and local failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connectivity { .. } => true,
            SyncError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::AuthenticationFailed => Some(401),
            SyncError::Forbidden => Some(403),
            SyncError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for a missing record or a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_)) || self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::connectivity("connection refused").is_retryable());
        assert!(SyncError::timeout("timed out").is_retryable());
        assert!(SyncError::from_status(503, "").is_retryable());
        assert!(SyncError::from_status(500, "boom").is_retryable());
        assert!(!SyncError::from_status(404, "").is_retryable());
        assert!(!SyncError::from_status(422, "bad").is_retryable());
        assert!(!SyncError::Validation("missing name".into()).is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn auth_statuses_are_distinct() {
        assert_eq!(SyncError::from_status(401, "x"), SyncError::AuthenticationFailed);
        assert_eq!(SyncError::from_status(403, "x"), SyncError::Forbidden);
        assert!(!SyncError::AuthenticationFailed.is_retryable());
        assert_eq!(SyncError::Forbidden.status(), Some(403));
    }

    #[test]
    fn not_found_detection() {
        assert!(SyncError::from_status(404, "").is_not_found());
        assert!(SyncError::NotFound("abc".into()).is_not_found());
        assert!(!SyncError::from_status(400, "").is_not_found());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Remote {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "remote error 502: bad gateway");
        assert!(SyncError::AuthenticationFailed
            .to_string()
            .contains("invalid API credential"));
    }
}
