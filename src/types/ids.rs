//! Newtype wrappers for feed identifiers.
//!
//! Event ids are assigned by the upstream feed and grow monotonically, so the
//! scanner can compare them to decide whether an event is older than its cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier the feed assigns to a kill event.
///
/// Within a single page the feed returns ids in descending order; across
/// scans a larger id always means a newer event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// Returns true for the zero id, which the feed uses for malformed records.
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(n: u64) -> Self {
        EventId(n)
    }
}
