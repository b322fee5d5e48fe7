//! Core domain types for the relay.
//!
//! Feed records and their identifiers, shared by the scanner and the
//! delivery worker.

pub mod event;
pub mod ids;

pub use event::{KillEvent, Participant};
pub use ids::EventId;
