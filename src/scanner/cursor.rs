//! The scan stop point.

use crate::types::EventId;

/// The highest event id covered by a committed scan.
///
/// Only ever moves forward. A fresh cursor (id 0) covers nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    last_seen: EventId,
}

impl ScanCursor {
    pub fn new(last_seen: impl Into<EventId>) -> Self {
        ScanCursor {
            last_seen: last_seen.into(),
        }
    }

    pub fn last_seen(&self) -> EventId {
        self.last_seen
    }

    /// Returns true if `id` was already covered by an earlier scan.
    pub fn covers(&self, id: EventId) -> bool {
        !self.last_seen.is_unset() && id <= self.last_seen
    }

    /// Moves the cursor to `id` if that is newer. Returns true if it moved.
    pub fn advance(&mut self, id: EventId) -> bool {
        if id > self.last_seen {
            self.last_seen = id;
            true
        } else {
            false
        }
    }
}
