//! Bounded, insertion-ordered sets of seen identifiers.
//!
//! The scanner and the delivery worker each keep ledgers of event ids they
//! have already handled. A ledger never grows past its capacity: inserting
//! into a full ledger evicts the oldest-inserted ids first. Lookups never
//! refresh an entry's position.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// A bounded set that remembers insertion order.
#[derive(Debug, Clone)]
pub struct DedupLedger<T> {
    /// Insertion order, oldest at the front.
    order: VecDeque<T>,

    /// Membership index over `order`.
    members: HashSet<T>,

    capacity: usize,
}

impl<T> DedupLedger<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an empty ledger holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        DedupLedger {
            order: VecDeque::with_capacity(capacity.min(4096)),
            members: HashSet::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &T) -> bool {
        self.members.contains(id)
    }

    /// Records `id`, evicting the oldest entries if the ledger overflows.
    ///
    /// Returns `false` (and changes nothing) if `id` was already present.
    pub fn insert(&mut self, id: T) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    /// Forgets `id`. Returns `true` if it was present.
    pub fn remove(&mut self, id: &T) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|x| x == id) {
            self.order.remove(pos);
        }
        true
    }

    /// Iterates over the ids from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}
