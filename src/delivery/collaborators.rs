//! Collaborator traits used by the delivery worker.
//!
//! Rendering, publishing and statistics live outside the relay. The worker
//! sees them only through these traits, which keeps it testable with mocks
//! and lets the binary choose concrete implementations at startup.

use std::future::Future;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::types::KillEvent;

use super::error::DeliveryError;

/// Estimated silver values for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Estimate {
    pub killer_build: u64,
    pub victim_build: u64,
    pub victim_inventory: u64,
    pub victim_total_loss: u64,
}

/// A rendered representation of an event, handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Nothing to attach.
    None,

    /// A temporary file owned by the delivery attempt.
    TempFile(PathBuf),
}

impl Artifact {
    /// Releases any temporary resources held by the artifact.
    pub fn release(self) {
        if let Artifact::TempFile(path) = self
            && let Err(e) = std::fs::remove_file(&path)
        {
            debug!(path = %path.display(), error = %e, "Failed to remove artifact");
        }
    }
}

/// Output of a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub artifact: Artifact,
    pub estimate: Estimate,
}

/// Produces an artifact and a value estimate for an event.
pub trait Renderer {
    fn render(
        &self,
        event: &KillEvent,
    ) -> impl Future<Output = Result<Rendered, DeliveryError>> + Send;
}

/// Publishes a rendered event.
pub trait Sink {
    fn send(
        &self,
        artifact: &Artifact,
        summary: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Records a successfully posted event.
///
/// Called exactly once per posted event, never for retries or failures.
/// Failures are logged and otherwise ignored.
pub trait StatsRecorder {
    type Error: std::fmt::Display;

    fn record(
        &self,
        event: &KillEvent,
        estimate: &Estimate,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
