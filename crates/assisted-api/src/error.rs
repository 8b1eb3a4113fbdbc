//! Error types for the installation API facade.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`InstallerApi`](crate::InstallerApi) operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} {reason}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Reason phrase (e.g. "Not Found").
        reason: String,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The service did not become reachable in time.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Build an HTTP error from a status code, using its canonical reason phrase.
    #[must_use]
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            reason: canonical_reason(status).to_string(),
            body: body.into(),
        }
    }

    /// 404 "Not Found".
    #[must_use]
    pub fn not_found(body: impl Into<String>) -> Self {
        Self::http(404, body)
    }

    /// 409 "Conflict".
    #[must_use]
    pub fn conflict(body: impl Into<String>) -> Self {
        Self::http(409, body)
    }

    /// HTTP status, if this is an HTTP error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Reason phrase, if this is an HTTP error.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Http { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether this error is an HTTP 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Canonical reason phrase of an HTTP status, "Unknown" for unregistered codes.
#[must_use]
pub fn canonical_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn not_found_carries_canonical_reason() {
        let err = ApiError::not_found("cluster missing");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.reason(), Some("Not Found"));
        assert!(err.is_not_found());
    }

    #[test_case(404, "Not Found")]
    #[test_case(409, "Conflict")]
    #[test_case(422, "Unprocessable Entity")]
    #[test_case(599, "Unknown")]
    fn reason_follows_status_registry(status: u16, reason: &str) {
        assert_eq!(canonical_reason(status), reason);
        assert_eq!(ApiError::http(status, "").reason(), Some(reason));
    }

    #[test]
    fn http_error_display() {
        let err = ApiError::conflict("name taken");
        assert_eq!(err.to_string(), "HTTP 409 Conflict: name taken");
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ApiError::Transport("connection refused".into());
        assert_eq!(err.status(), None);
        assert_eq!(err.reason(), None);
        assert!(!err.is_not_found());
    }
}
