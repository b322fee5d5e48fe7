//! Pending delivery jobs, ordered by eligibility time.
//!
//! Jobs are ordered by `next_eligible_at` (earliest first), then by sequence
//! number (FIFO among jobs eligible at the same instant). A retry re-appends
//! the same job with a fresh sequence number and a later eligibility time.
//!
//! The queue is bounded: new jobs are rejected once `capacity` is reached.
//! Re-appends of retried jobs are always accepted since they already held
//! a slot.

use std::collections::{BinaryHeap, HashSet};

use tokio::time::Instant;

use crate::types::{EventId, KillEvent};

/// One unit of delivery work.
#[derive(Debug, Clone)]
pub struct Job {
    pub event: KillEvent,

    /// Failed attempts so far.
    pub attempt: u32,

    /// The job may not be delivered before this instant.
    pub next_eligible_at: Instant,

    /// FIFO tie-breaker.
    sequence: u64,
}

impl Job {
    pub fn id(&self) -> EventId {
        self.event.id
    }
}

// BinaryHeap is a max-heap, so both keys are reversed: the earliest
// eligibility time and the lowest sequence number sort highest.
impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.next_eligible_at == other.next_eligible_at && self.sequence == other.sequence
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .next_eligible_at
            .cmp(&self.next_eligible_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Outcome of [`JobQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// A job for this id is already waiting.
    Duplicate,
    /// The queue is at capacity; the job was dropped.
    Full,
}

/// Jobs awaiting delivery.
#[derive(Debug)]
pub struct JobQueue {
    heap: BinaryHeap<Job>,

    next_sequence: u64,

    /// Ids of the jobs currently in `heap`.
    queued_ids: HashSet<EventId>,

    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        JobQueue {
            heap: BinaryHeap::new(),
            next_sequence: 0,
            queued_ids: HashSet::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if a job for this id is waiting.
    pub fn contains(&self, id: &EventId) -> bool {
        self.queued_ids.contains(id)
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Appends a fresh job (attempt 0) eligible at `now`.
    pub fn push(&mut self, event: KillEvent, now: Instant) -> PushOutcome {
        if self.queued_ids.contains(&event.id) {
            return PushOutcome::Duplicate;
        }
        if self.heap.len() >= self.capacity {
            return PushOutcome::Full;
        }

        let sequence = self.next_sequence();
        self.queued_ids.insert(event.id);
        self.heap.push(Job {
            event,
            attempt: 0,
            next_eligible_at: now,
            sequence,
        });
        PushOutcome::Queued
    }

    /// Re-appends a job after a failed attempt. Never rejected for capacity.
    pub fn requeue(&mut self, mut job: Job) {
        job.sequence = self.next_sequence();
        self.queued_ids.insert(job.id());
        self.heap.push(job);
    }

    /// Removes the job with the earliest eligibility time, if it is due by `now`.
    pub fn pop_ready(&mut self, now: Instant) -> Option<Job> {
        if self.heap.peek()?.next_eligible_at > now {
            return None;
        }
        let job = self.heap.pop()?;
        self.queued_ids.remove(&job.id());
        Some(job)
    }

    /// The earliest eligibility time among waiting jobs.
    pub fn next_eligible_at(&self) -> Option<Instant> {
        self.heap.peek().map(|job| job.next_eligible_at)
    }
}
