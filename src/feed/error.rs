//! Feed fetch error types.
//!
//! The upstream feed is notoriously unreliable: besides timeouts it regularly
//! answers with 5xx pages, truncated bodies and the odd spurious 403 or 404.
//! Every failure the server answers with is therefore transient. Only local
//! failures such as a malformed request URL are permanent.

use std::fmt;
use thiserror::Error;

use crate::error::FailureKind;

/// An error fetching one page of the feed.
#[derive(Debug, Error)]
pub struct FeedError {
    /// Retry classification.
    pub kind: FailureKind,

    /// The page offset being fetched.
    pub offset: u32,

    /// The HTTP status code, if the server answered.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying HTTP client error, if available.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "feed error at offset {} (HTTP {}): {}",
                self.offset, code, self.message
            ),
            None => write!(f, "feed error at offset {}: {}", self.offset, self.message),
        }
    }
}

impl FeedError {
    /// Categorizes an HTTP client error raised while fetching `offset`.
    pub fn from_reqwest(offset: u32, err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = match status_code {
            Some(code) => classify_status(code),
            // Decode failures on this feed are truncated pages, not bad schemas.
            None if err.is_decode() => FailureKind::Network,
            None => FailureKind::from_reqwest(&err),
        };
        FeedError {
            kind,
            offset,
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Creates an error for a non-success HTTP status.
    pub fn from_status(offset: u32, status: u16) -> Self {
        FeedError {
            kind: classify_status(status),
            offset,
            status_code: Some(status),
            message: format!("unexpected status {}", status),
            source: None,
        }
    }

    /// Creates a transient error without an HTTP client source.
    pub fn transient_without_source(offset: u32, message: impl Into<String>) -> Self {
        FeedError {
            kind: FailureKind::Network,
            offset,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without an HTTP client source.
    pub fn permanent_without_source(offset: u32, message: impl Into<String>) -> Self {
        FeedError {
            kind: FailureKind::Permanent,
            offset,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        self.source.as_ref().is_some_and(|e| e.is_timeout())
    }
}

/// Feed-specific status classification: any non-success status is retried.
fn classify_status(status: u16) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        _ => FailureKind::Network,
    }
}
