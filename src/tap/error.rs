//! Error types for the TAP client.
//!
//! This module defines structured errors for session construction, the
//! asynchronous job protocol, result parsing, and file downloads, providing
//! context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to the APPLAUSE archive.
#[derive(Debug, Error)]
pub enum TapError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    ///
    /// Covers both outright rejections (e.g. an invalid token) and the
    /// transient 500s the archive serves when results are fetched too early.
    #[error("HTTP {status} requesting {url}")]
    Status {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server reported that the query job terminated in an error state.
    #[error("query job failed: {detail}")]
    Job {
        /// Error detail as reported by the server.
        detail: String,
    },

    /// The server response could not be interpreted (malformed UWS job
    /// document, unparseable VOTable, missing required fields).
    #[error("unexpected server response: {detail}")]
    Protocol {
        /// What was malformed or missing.
        detail: String,
    },

    /// File system error while saving a download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL or server path is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The session transport could not be (re)built, e.g. because the
    /// authentication token contains characters not allowed in an HTTP header.
    #[error("session configuration error: {detail}")]
    Session {
        /// What went wrong while configuring the session.
        detail: String,
    },
}

impl TapError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates a job execution error carrying the server's error detail.
    pub fn job(detail: impl Into<String>) -> Self {
        Self::Job {
            detail: detail.into(),
        }
    }

    /// Creates a protocol error for a malformed server response.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
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

    /// Creates a session configuration error.
    pub fn session(detail: impl Into<String>) -> Self {
        Self::Session {
            detail: detail.into(),
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because our error variants require context (url, path) that the source errors
// don't provide. The helper constructor methods (network(), io(), etc.) allow
// callers to supply that context at each use site.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let error = TapError::status("https://www.plate-archive.org/tap/async", 500);
        let msg = error.to_string();
        assert!(msg.contains("500"), "Expected '500' in: {msg}");
        assert!(msg.contains("/tap/async"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_job_display_carries_server_detail() {
        let error = TapError::job("ADQL syntax error near 'FRM'");
        let msg = error.to_string();
        assert!(
            msg.contains("ADQL syntax error near 'FRM'"),
            "Expected server detail in: {msg}"
        );
    }

    #[test]
    fn test_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = TapError::io(PathBuf::from("/tmp/scan.jpg"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/scan.jpg"), "Expected path in: {msg}");
    }

    #[test]
    fn test_invalid_url_display() {
        let error = TapError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(
            msg.contains("invalid URL"),
            "Expected 'invalid URL' in: {msg}"
        );
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
    }
}
