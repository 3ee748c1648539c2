//! Error types for server API operations.
//!
//! Every failure a network-issuing operation can hit is named here. Most
//! operations never return these to their caller: they are reported to the
//! registered notifier and collapse to `None`/`false`. Only the
//! "await-or-fail" transport variant hands them back.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to the archive server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The connectivity gate refused the call; no request was sent.
    #[error("connection unavailable; request to {endpoint} skipped")]
    ConnectivityDenied {
        /// The endpoint path that was skipped.
        endpoint: String,
    },

    /// DNS, socket, TLS or timeout failure before a response arrived.
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} requesting {url}")]
    Server {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server answered 2xx but the body carried an explicit error.
    #[error("server reported an error for {url}: {message}")]
    Application {
        /// The URL of the request.
        url: String,
        /// The error text from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response from {url}: {source}")]
    Decode {
        /// The URL of the request.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The awaiting operation was cancelled. Never reported as a failure.
    #[error("request cancelled")]
    Cancelled,

    /// The job poller observed the `failed` terminal state.
    #[error("server job {job} failed")]
    JobFailed {
        /// The job identifier.
        job: u64,
    },

    /// The job poller stopped before a verdict (cancelled or status query failed).
    #[error("server job {job} state could not be determined")]
    JobIndeterminate {
        /// The job identifier.
        job: u64,
    },

    /// Local filesystem failure (header store, downloaded pages).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Creates a connectivity-denied error.
    pub fn connectivity_denied(endpoint: impl Into<String>) -> Self {
        Self::ConnectivityDenied {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a transport error from a reqwest error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates a server status error.
    pub fn server(url: impl Into<String>, status: u16) -> Self {
        Self::Server {
            url: url.into(),
            status,
        }
    }

    /// Creates an application error.
    pub fn application(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Application {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures that are recovered locally without a
    /// user-visible error (skipped calls, cancellation, undecided jobs).
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::ConnectivityDenied { .. } | Self::Cancelled | Self::JobIndeterminate { .. }
        )
    }
}
