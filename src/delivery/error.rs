//! Delivery error types.
//!
//! Render and sink collaborators report failures as [`DeliveryError`]s that
//! already carry a [`FailureKind`]. The worker retries transient kinds within
//! its budget and drops the job on anything else.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::FailureKind;
use crate::types::EventId;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed delivery attempt.
#[derive(Debug, Error)]
pub struct DeliveryError {
    /// Retry classification.
    pub kind: FailureKind,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying error, if available.
    #[source]
    pub source: Option<BoxError>,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            FailureKind::Network => "network",
            FailureKind::RateLimited => "rate limited",
            FailureKind::Permanent => "permanent",
        };
        write!(f, "delivery error ({}): {}", label, self.message)
    }
}

impl DeliveryError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        DeliveryError {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, message)
    }

    /// The overall render + send deadline elapsed.
    pub fn timeout(event_id: EventId, after: Duration) -> Self {
        Self::network(format!(
            "timeout exceeded for posting kill {} after {}s",
            event_id,
            after.as_secs()
        ))
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Categorizes an HTTP client error from a sink or renderer.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        Self::new(FailureKind::from_reqwest(&err), err.to_string()).with_source(err)
    }

    /// Categorizes a non-success HTTP status from a sink or renderer.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::new(
            FailureKind::from_status(status),
            format!("HTTP {}: {}", status, body.trim()),
        )
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
