//! Serial delivery of matched events with bounded retry.
//!
//! One worker owns the job queue and both sink-side ledgers. It delivers one
//! job at a time, to completion, before selecting the next:
//!
//! ```text
//! Queued ──► InFlight ──► Posted            (terminal)
//!                    ├──► Queued(attempt+1) (transient error, budget left)
//!                    └──► Failed            (terminal)
//! ```
//!
//! # Retry Policy
//!
//! A transient failure on attempt `n < max_retries` re-appends the job with
//! `attempt = n + 1`, eligible after `base_delay * 2^n` plus up to
//! `max_jitter` of jitter. Anything else drops the job and logs it.
//!
//! # Async Event Loop
//!
//! The worker runs as a tokio task that handles:
//! - Incoming events via its message channel
//! - Sleeping until the earliest queued job becomes eligible
//! - Graceful shutdown via cancellation token (the current delivery still
//!   runs to completion)

use std::hash::{BuildHasher, RandomState};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::ledger::DedupLedger;
use crate::types::{EventId, KillEvent};
use crate::watch::WatchConfig;

use super::collaborators::{Estimate, Rendered, Renderer, Sink, StatsRecorder};
use super::error::DeliveryError;
use super::message::{DeliveryHandle, DeliveryMessage};
use super::queue::{Job, JobQueue, PushOutcome};
use super::summary::summarize;

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);
const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MIN_SLEEP: Duration = Duration::from_millis(250);
const DEFAULT_MAX_PENDING: usize = 1000;
const DEFAULT_POSTED_CAPACITY: usize = 1500;
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for the delivery worker.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Retries allowed per job after its first attempt.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,

    /// Upper bound (exclusive) on the random delay added to each retry.
    pub max_jitter: Duration,

    /// Deadline covering render and send together.
    pub post_timeout: Duration,

    /// Shortest idle sleep while waiting for a job to become eligible.
    pub min_sleep: Duration,

    /// Maximum number of jobs waiting in the queue.
    pub max_pending: usize,

    /// Number of posted ids remembered for deduplication.
    pub posted_capacity: usize,

    /// Capacity of the enqueue channel.
    pub channel_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
            post_timeout: DEFAULT_POST_TIMEOUT,
            min_sleep: DEFAULT_MIN_SLEEP,
            max_pending: DEFAULT_MAX_PENDING,
            posted_capacity: DEFAULT_POSTED_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Outcome of [`DeliveryWorker::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The event carries no id.
    MissingId,
    AlreadyPosted,
    InFlight,
    AlreadyQueued,
    /// The queue is full; the event was dropped.
    QueueFull,
}

/// Outcome of a delivery attempt that did not end in a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The sink accepted the event.
    Posted,

    /// The event was a knockdown and was silently discarded.
    Dropped,

    /// A transient failure; the job was re-appended.
    Requeued { attempt: u32, delay: Duration },
}

/// The single delivery worker.
pub struct DeliveryWorker<R, S, T> {
    config: DeliveryConfig,

    queue: JobQueue,

    /// Ids the sink has accepted.
    posted: DedupLedger<EventId>,

    /// Ids with a delivery attempt underway.
    in_flight: DedupLedger<EventId>,

    renderer: R,
    sink: S,
    stats: T,

    /// Used to mark losses in summaries.
    watch: WatchConfig,

    /// Per-process random keys; hashing through them yields retry jitter.
    jitter_seed: RandomState,
}

impl<R, S, T> DeliveryWorker<R, S, T>
where
    R: Renderer,
    S: Sink,
    T: StatsRecorder,
{
    pub fn new(config: DeliveryConfig, renderer: R, sink: S, stats: T) -> Self {
        DeliveryWorker {
            queue: JobQueue::new(config.max_pending),
            posted: DedupLedger::new(config.posted_capacity),
            in_flight: DedupLedger::new(config.max_pending.max(1)),
            config,
            renderer,
            sink,
            stats,
            watch: WatchConfig::default(),
            jitter_seed: RandomState::new(),
        }
    }

    /// Sets the watchlist used to tell losses from kills in summaries.
    pub fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn is_posted(&self, id: &EventId) -> bool {
        self.posted.contains(id)
    }

    pub fn is_in_flight(&self, id: &EventId) -> bool {
        self.in_flight.contains(id)
    }

    /// Adds a job for `event` unless it is already posted, in flight, or queued.
    pub fn enqueue(&mut self, event: KillEvent) -> EnqueueOutcome {
        let id = event.id;
        if id.is_unset() {
            return EnqueueOutcome::MissingId;
        }
        if self.posted.contains(&id) {
            trace!(event_id = %id, "Skipping already-posted event");
            return EnqueueOutcome::AlreadyPosted;
        }
        if self.in_flight.contains(&id) {
            trace!(event_id = %id, "Skipping in-flight event");
            return EnqueueOutcome::InFlight;
        }

        match self.queue.push(event, Instant::now()) {
            PushOutcome::Queued => {
                debug!(event_id = %id, queued = self.queue.len(), "Queued event for delivery");
                EnqueueOutcome::Queued
            }
            PushOutcome::Duplicate => {
                trace!(event_id = %id, "Skipping already-queued event");
                EnqueueOutcome::AlreadyQueued
            }
            PushOutcome::Full => {
                warn!(
                    event_id = %id,
                    capacity = self.queue.capacity(),
                    "Delivery queue full, dropping event"
                );
                EnqueueOutcome::QueueFull
            }
        }
    }

    /// Computes the wait before retry number `attempt` (1-indexed).
    pub fn retry_delay(&self, id: EventId, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self.config.base_delay.saturating_mul(1u32 << exponent);

        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.jitter_seed.hash_one((id, attempt)) % jitter_ms)
        };
        backoff + jitter
    }

    /// Attempts one delivery of `job`.
    ///
    /// Returns `Err` only for terminal failures; the job is gone either way
    /// unless the outcome is [`DeliveryOutcome::Requeued`].
    pub async fn deliver(&mut self, mut job: Job) -> Result<DeliveryOutcome, DeliveryError> {
        if job.event.is_knockdown() {
            debug!(event_id = %job.id(), "Dropping knockdown");
            return Ok(DeliveryOutcome::Dropped);
        }

        let id = job.id();
        self.in_flight.insert(id);
        let result = self.render_and_send(&job.event).await;

        match result {
            Ok(estimate) => {
                self.posted.insert(id);
                if let Err(e) = self.stats.record(&job.event, &estimate).await {
                    warn!(event_id = %id, error = %e, "Failed to record stats");
                }
                self.in_flight.remove(&id);
                info!(event_id = %id, attempt = job.attempt, "Posted event");
                Ok(DeliveryOutcome::Posted)
            }
            Err(e) if e.is_transient() && job.attempt < self.config.max_retries => {
                job.attempt += 1;
                let attempt = job.attempt;
                let delay = self.retry_delay(id, attempt);
                job.next_eligible_at = Instant::now() + delay;

                warn!(
                    event_id = %id,
                    attempt,
                    max_retries = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Delivery failed, retrying"
                );
                self.queue.requeue(job);
                self.in_flight.remove(&id);
                Ok(DeliveryOutcome::Requeued { attempt, delay })
            }
            Err(e) => {
                self.in_flight.remove(&id);
                Err(e)
            }
        }
    }

    /// Renders and sends under one deadline, releasing the artifact afterwards.
    async fn render_and_send(&self, event: &KillEvent) -> Result<Estimate, DeliveryError> {
        let mut rendered: Option<Rendered> = None;
        let victim_watched = self.watch.victim_is_watched(event);

        let attempt = async {
            let output = rendered.insert(self.renderer.render(event).await?);
            let summary = summarize(event, &output.estimate, victim_watched);
            self.sink.send(&output.artifact, &summary).await?;
            Ok::<_, DeliveryError>(output.estimate)
        };

        let result = match tokio::time::timeout(self.config.post_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::timeout(event.id, self.config.post_timeout)),
        };

        if let Some(output) = rendered.take() {
            output.artifact.release();
        }
        result
    }

    /// Takes the next eligible job and delivers it, logging terminal failures.
    ///
    /// Returns `false` if no job was ready.
    pub async fn process_next(&mut self) -> bool {
        let Some(job) = self.queue.pop_ready(Instant::now()) else {
            return false;
        };

        let id = job.id();
        if self.posted.contains(&id) || self.in_flight.contains(&id) {
            trace!(event_id = %id, "Skipping job delivered while waiting");
            return true;
        }

        if let Err(e) = self.deliver(job).await {
            error!(event_id = %id, error = %e, "Delivery failed permanently, dropping event");
        }
        true
    }

    /// How long to sleep before the earliest queued job becomes eligible.
    fn time_until_next_job(&self) -> Option<Duration> {
        let at = self.queue.next_eligible_at()?;
        let wait = at.saturating_duration_since(Instant::now());
        Some(wait.max(self.config.min_sleep))
    }

    fn handle_message(&mut self, msg: DeliveryMessage) {
        match msg {
            DeliveryMessage::Enqueue(event) => {
                self.enqueue(*event);
            }
        }
    }

    // ─── Async Event Loop ─────────────────────────────────────────────────────────

    /// Runs the worker until shutdown, or until its channel closes and the
    /// queue has drained.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut rx: mpsc::Receiver<DeliveryMessage>, shutdown: CancellationToken) {
        info!("Delivery worker started");
        let mut closed = false;

        loop {
            // Take everything already waiting before choosing a job.
            while !closed {
                match rx.try_recv() {
                    Ok(msg) => self.handle_message(msg),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => closed = true,
                }
            }

            if shutdown.is_cancelled() {
                info!("Shutdown signal received, stopping delivery worker");
                break;
            }

            if self.process_next().await {
                continue;
            }

            let wait = self.time_until_next_job();
            if closed && wait.is_none() {
                info!("Delivery channel closed and queue drained");
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping delivery worker");
                    break;
                }

                msg = rx.recv(), if !closed => {
                    match msg {
                        Some(msg) => self.handle_message(msg),
                        None => closed = true,
                    }
                }

                _ = async {
                    match wait {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => std::future::pending().await,
                    }
                } => {}
            }
        }

        if !self.queue.is_empty() {
            warn!(pending = self.queue.len(), "Delivery worker stopped with jobs pending");
        }
        info!("Delivery worker stopped");
    }
}

impl<R, S, T> DeliveryWorker<R, S, T>
where
    R: Renderer + Send + Sync + 'static,
    S: Sink + Send + Sync + 'static,
    T: StatsRecorder + Send + Sync + 'static,
{
    /// Spawns the worker on the current runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> (DeliveryHandle, JoinHandle<()>) {
        let (handle, rx) = DeliveryHandle::channel(self.config.channel_capacity);
        let task = tokio::spawn(self.run(rx, shutdown));
        (handle, task)
    }
}
