//! Error types for the download module.
//!
//! [`DownloadError`] never escapes a run: the fetch layer converts it into an
//! [`Outcome`](super::Outcome) or, for local failures, into an unhandled
//! worker error at the pool boundary. [`ConfigError`] is raised before a run
//! starts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a single task.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out (connect or read phase).
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Terminal response other than 200 OK.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// Error while reading the response body after a 200 status.
    #[error("body read failed for {url}: {source}")]
    BodyRead {
        /// The URL whose body stream broke.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Local file system error (create directory, open, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The remote URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
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

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a body read error, promoting read timeouts.
    pub fn body_read(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::BodyRead {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error originated on the local side rather than the network.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Invalid run configuration, surfaced before any task is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No local root was supplied.
    #[error("local root path is empty")]
    EmptyLocalRoot,

    /// The remote root is not an absolute http(s) URL.
    #[error("invalid remote root '{url}': {reason}")]
    InvalidRemoteRoot {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Concurrency outside the accepted range.
    #[error("invalid concurrency value {value}: must be between {min} and {max}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Request timeout of zero.
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    /// A header name or value that cannot be sent.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as supplied.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A fixed referer that is not an absolute URL.
    #[error("invalid referer '{url}'")]
    InvalidReferer {
        /// The rejected value.
        url: String,
    },
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/a.png");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/a.png"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/a.png", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/a.png"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_download_error_retry_after_is_kept() {
        let error = DownloadError::http_status_with_retry_after(
            "https://example.com/a.png",
            429,
            Some("5".to_string()),
        );
        assert!(matches!(
            error,
            DownloadError::HttpStatus { status: 429, retry_after: Some(ref v), .. } if v == "5"
        ));
    }

    #[test]
    fn test_download_error_io_is_local() {
        let error = DownloadError::io(
            "/tmp/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_local());
        assert!(error.to_string().contains("/tmp/a.png"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidConcurrency {
            value: 0,
            min: 1,
            max: 100,
        };
        assert_eq!(
            error.to_string(),
            "invalid concurrency value 0: must be between 1 and 100"
        );
        let error = ConfigError::InvalidHeader {
            name: "X Bad".to_string(),
            reason: "invalid header name".to_string(),
        };
        assert!(error.to_string().contains("X Bad"));
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not a url");
        assert_eq!(error.to_string(), "invalid URL: not a url");
        assert!(!error.is_local());
    }
}
