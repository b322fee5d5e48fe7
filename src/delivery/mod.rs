//! Serial delivery of matched events to the publish sink.
//!
//! The scanner hands matched events to a single [`DeliveryWorker`] through a
//! [`DeliveryHandle`]. The worker renders each event, posts it, and records
//! stats, retrying transient failures with exponential backoff and jitter.
//!
//! # Module Structure
//!
//! - [`collaborators`]: renderer, sink and stats seams
//! - [`queue`]: pending jobs ordered by eligibility time
//! - [`message`]: the worker's channel and handle
//! - [`summary`]: the text posted alongside each artifact
//! - [`sinks`], [`stats`]: bundled collaborator implementations

pub mod collaborators;
mod error;
mod message;
pub mod queue;
pub mod sinks;
pub mod stats;
pub mod summary;
mod worker;

#[cfg(test)]
mod tests;

pub use collaborators::{Artifact, Estimate, Rendered, Renderer, Sink, StatsRecorder};
pub use error::DeliveryError;
pub use message::{DeliveryHandle, DeliveryMessage};
pub use queue::{Job, JobQueue, PushOutcome};
pub use sinks::{LogSink, NoArtifactRenderer, WebhookSink};
pub use stats::{JsonlStatsRecorder, NoopStats, StatsError};
pub use worker::{DeliveryConfig, DeliveryOutcome, DeliveryWorker, EnqueueOutcome};
