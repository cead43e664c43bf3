//! Error types for page navigation and raw fetches.
//!
//! Every variant carries the URL it concerns so that adapters can log a
//! skipped record without reconstructing context.

use thiserror::Error;

/// Errors that can occur while navigating to a page or fetching a payload.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The response body exceeded the configured size cap.
    #[error("payload from {url} exceeds the {limit_bytes} byte limit")]
    BodyTooLarge {
        /// The URL being fetched.
        url: String,
        /// Configured cap in bytes.
        limit_bytes: u64,
    },

    /// The page loaded but failed the caller's success check.
    #[error("page at {url} rejected: {reason}")]
    Rejected {
        /// The URL that was requested.
        url: String,
        /// Why the page did not count as a successful navigation.
        reason: String,
    },

    /// Every allowed attempt failed.
    #[error("navigation exhausted after {attempts} attempt(s) for {url}: {last_error}")]
    Exhausted {
        /// The URL that was requested.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last_error: Box<NavigationError>,
    },

    /// The HTTP session could not be created.
    #[error("could not build HTTP session: {reason}")]
    Session {
        /// Why construction failed.
        reason: String,
    },
}

impl NavigationError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a size-cap error.
    pub fn body_too_large(url: impl Into<String>, limit_bytes: u64) -> Self {
        Self::BodyTooLarge {
            url: url.into(),
            limit_bytes,
        }
    }

    /// Creates a success-check rejection.
    pub fn rejected(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wraps the final attempt's error once the attempt budget is spent.
    pub fn exhausted(url: impl Into<String>, attempts: u32, last_error: NavigationError) -> Self {
        Self::Exhausted {
            url: url.into(),
            attempts,
            last_error: Box::new(last_error),
        }
    }

    /// Creates a session construction error.
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status code when this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Exhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}
