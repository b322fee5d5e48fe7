//! Failure classification shared by the collaborator boundaries.
//!
//! Every failure crossing a collaborator boundary (feed fetch, render, sink)
//! is tagged with a [`FailureKind`] where it is produced. Retry decisions
//! look only at the kind, never at error text.

use thiserror::Error;

/// The kind of failure, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network-level failure: timeouts, resets, refused connections,
    /// gateway errors (502/503/504). Safe to retry.
    Network,

    /// The remote asked us to slow down (HTTP 429). Safe to retry.
    RateLimited,

    /// Anything else. Retrying would fail the same way.
    Permanent,
}

impl FailureKind {
    /// Returns true if this failure may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Network | FailureKind::RateLimited)
    }

    /// Classifies an HTTP status code.
    ///
    /// Only the statuses that signal a temporary condition are transient;
    /// callers with a flakier upstream may widen this.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureKind::RateLimited,
            408 | 502 | 503 | 504 => FailureKind::Network,
            _ => FailureKind::Permanent,
        }
    }

    /// Classifies a transport error from the HTTP client.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            FailureKind::Network
        } else {
            FailureKind::Permanent
        }
    }
}

/// Errors that stop the relay from starting.
///
/// Once running, nothing is fatal; these only cover startup.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Binding the health server failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
