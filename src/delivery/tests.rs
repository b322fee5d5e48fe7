//! Scenario tests for the delivery worker.
//!
//! All tests run on paused time so backoff and timeouts elapse instantly.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FailureKind;
use crate::types::{EventId, KillEvent, Participant};
use crate::watch::WatchConfig;

use super::*;

// ─── Test Helpers ───

#[derive(Clone, Default)]
struct MockRenderer {
    calls: Arc<AtomicU32>,
    /// Written on every render and handed out as the artifact.
    artifact: Option<PathBuf>,
    /// Simulated render time.
    latency: Duration,
}

impl Renderer for MockRenderer {
    async fn render(&self, _event: &KillEvent) -> Result<Rendered, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let artifact = match &self.artifact {
            Some(path) => {
                std::fs::write(path, b"png").map_err(|e| DeliveryError::permanent(e.to_string()))?;
                Artifact::TempFile(path.clone())
            }
            None => Artifact::None,
        };
        Ok(Rendered {
            artifact,
            estimate: Estimate {
                victim_total_loss: 2_500_000,
                ..Estimate::default()
            },
        })
    }
}

/// A sink that fails according to a script, then succeeds.
#[derive(Clone, Default)]
struct MockSink {
    calls: Arc<AtomicU32>,
    failures: Arc<Mutex<VecDeque<FailureKind>>>,
    summaries: Arc<Mutex<Vec<String>>>,
    /// Fail every call with this kind once the script runs out.
    always_fail: Option<FailureKind>,
}

impl MockSink {
    fn failing(script: impl IntoIterator<Item = FailureKind>) -> Self {
        MockSink {
            failures: Arc::new(Mutex::new(script.into_iter().collect())),
            ..MockSink::default()
        }
    }

    fn always(kind: FailureKind) -> Self {
        MockSink {
            always_fail: Some(kind),
            ..MockSink::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sink for MockSink {
    async fn send(&self, _artifact: &Artifact, summary: &str) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summaries.lock().unwrap().push(summary.to_string());

        let scripted = self.failures.lock().unwrap().pop_front();
        match scripted.or(self.always_fail) {
            Some(kind) => Err(DeliveryError::new(kind, "scripted failure")),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
struct MockStats {
    calls: Arc<AtomicU32>,
    fail: bool,
}

impl StatsRecorder for MockStats {
    type Error = String;

    async fn record(&self, _event: &KillEvent, _estimate: &Estimate) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err("stats store unavailable".to_string())
        } else {
            Ok(())
        }
    }
}

type TestWorker = DeliveryWorker<MockRenderer, MockSink, MockStats>;

fn event(id: u64) -> KillEvent {
    KillEvent::new(
        id,
        Participant::new("Alice", "Foo", ""),
        Participant::new("Bob", "Bar", ""),
        1_000,
    )
}

fn knockdown(id: u64) -> KillEvent {
    KillEvent::new(
        id,
        Participant::new("Alice", "Foo", ""),
        Participant::new("Bob", "Bar", ""),
        0,
    )
}

fn job(event: KillEvent) -> Job {
    let mut queue = JobQueue::new(1);
    let now = Instant::now();
    queue.push(event, now);
    queue.pop_ready(now).unwrap()
}

fn worker(renderer: MockRenderer, sink: MockSink, stats: MockStats) -> TestWorker {
    DeliveryWorker::new(DeliveryConfig::default(), renderer, sink, stats)
}

// ─── Enqueue ───

#[tokio::test(start_paused = true)]
async fn duplicate_enqueue_yields_one_job() {
    let mut w = worker(MockRenderer::default(), MockSink::default(), MockStats::default());

    assert_eq!(w.enqueue(event(1)), EnqueueOutcome::Queued);
    assert_eq!(w.enqueue(event(1)), EnqueueOutcome::AlreadyQueued);
    assert_eq!(w.queue().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn enqueue_rejects_missing_id() {
    let mut w = worker(MockRenderer::default(), MockSink::default(), MockStats::default());

    assert_eq!(w.enqueue(event(0)), EnqueueOutcome::MissingId);
    assert!(w.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enqueue_after_post_is_skipped() {
    let sink = MockSink::default();
    let mut w = worker(MockRenderer::default(), sink.clone(), MockStats::default());

    w.enqueue(event(7));
    assert!(w.process_next().await);
    assert!(w.is_posted(&EventId(7)));

    assert_eq!(w.enqueue(event(7)), EnqueueOutcome::AlreadyPosted);
    assert!(w.queue().is_empty());
    assert_eq!(sink.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_newest() {
    let config = DeliveryConfig {
        max_pending: 2,
        ..DeliveryConfig::default()
    };
    let mut w = DeliveryWorker::new(
        config,
        MockRenderer::default(),
        MockSink::default(),
        MockStats::default(),
    );

    assert_eq!(w.enqueue(event(1)), EnqueueOutcome::Queued);
    assert_eq!(w.enqueue(event(2)), EnqueueOutcome::Queued);
    assert_eq!(w.enqueue(event(3)), EnqueueOutcome::QueueFull);
    assert!(w.queue().contains(&EventId(1)));
    assert!(!w.queue().contains(&EventId(3)));
}

// ─── Deliver ───

#[tokio::test(start_paused = true)]
async fn success_posts_and_records_stats_once() {
    let renderer = MockRenderer::default();
    let sink = MockSink::default();
    let stats = MockStats::default();
    let mut w = worker(renderer.clone(), sink.clone(), stats.clone());

    let outcome = w.deliver(job(event(10))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Posted);
    assert!(w.is_posted(&EventId(10)));
    assert!(!w.is_in_flight(&EventId(10)));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.calls(), 1);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stats_failure_does_not_undo_post() {
    let stats = MockStats {
        fail: true,
        ..MockStats::default()
    };
    let mut w = worker(MockRenderer::default(), MockSink::default(), stats.clone());

    let outcome = w.deliver(job(event(10))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Posted);
    assert!(w.is_posted(&EventId(10)));
    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn network_failure_requeues_with_backoff() {
    let sink = MockSink::failing([FailureKind::Network]);
    let stats = MockStats::default();
    let mut w = worker(MockRenderer::default(), sink.clone(), stats.clone());

    let before = Instant::now();
    let outcome = w.deliver(job(event(11))).await.unwrap();

    let DeliveryOutcome::Requeued { attempt, delay } = outcome else {
        panic!("expected requeue, got {outcome:?}");
    };
    assert_eq!(attempt, 1);
    assert!(delay >= Duration::from_millis(5000), "delay {delay:?}");
    assert!(delay < Duration::from_millis(6000), "delay {delay:?}");

    let eligible = w.queue().next_eligible_at().unwrap();
    assert_eq!(eligible - before, delay);
    assert!(!w.is_posted(&EventId(11)));
    assert!(!w.is_in_flight(&EventId(11)));
    assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_is_retried() {
    let mut w = worker(
        MockRenderer::default(),
        MockSink::failing([FailureKind::RateLimited]),
        MockStats::default(),
    );

    let outcome = w.deliver(job(event(12))).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Requeued { attempt: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_terminal() {
    let sink = MockSink::failing([FailureKind::Permanent]);
    let mut w = worker(MockRenderer::default(), sink.clone(), MockStats::default());

    let err = w.deliver(job(event(13))).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Permanent);
    assert!(w.queue().is_empty());
    assert!(!w.is_posted(&EventId(13)));
    assert!(!w.is_in_flight(&EventId(13)));
    assert_eq!(sink.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn knockdown_is_dropped_without_side_effects() {
    let renderer = MockRenderer::default();
    let sink = MockSink::default();
    let stats = MockStats::default();
    let mut w = worker(renderer.clone(), sink.clone(), stats.clone());

    let outcome = w.deliver(job(knockdown(14))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Dropped);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.calls(), 0);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
    assert!(!w.is_posted(&EventId(14)));
    assert!(!w.is_in_flight(&EventId(14)));
}

#[tokio::test(start_paused = true)]
async fn attempts_stop_at_max_retries() {
    let sink = MockSink::always(FailureKind::Network);
    let mut w = worker(MockRenderer::default(), sink.clone(), MockStats::default());
    let max_retries = w.config().max_retries;

    w.enqueue(event(15));
    while !w.queue().is_empty() {
        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(w.process_next().await);
    }

    assert_eq!(sink.calls(), max_retries + 1);
    assert!(!w.is_posted(&EventId(15)));
    assert!(!w.is_in_flight(&EventId(15)));
}

#[tokio::test(start_paused = true)]
async fn retry_delay_doubles_per_attempt() {
    let w = worker(MockRenderer::default(), MockSink::default(), MockStats::default());

    for (attempt, base_secs) in [(1, 5), (2, 10), (3, 20), (4, 40)] {
        let delay = w.retry_delay(EventId(1), attempt);
        let base = Duration::from_secs(base_secs);
        assert!(delay >= base, "attempt {attempt}: {delay:?}");
        assert!(delay < base + Duration::from_secs(1), "attempt {attempt}: {delay:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn slow_render_times_out_and_requeues() {
    let renderer = MockRenderer {
        latency: Duration::from_secs(300),
        ..MockRenderer::default()
    };
    let sink = MockSink::default();
    let mut w = worker(renderer, sink.clone(), MockStats::default());

    let outcome = w.deliver(job(event(16))).await.unwrap();

    assert!(matches!(outcome, DeliveryOutcome::Requeued { attempt: 1, .. }));
    assert_eq!(sink.calls(), 0);
    assert!(!w.is_in_flight(&EventId(16)));
}

#[tokio::test(start_paused = true)]
async fn artifact_released_after_success_and_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kill.png");
    let renderer = MockRenderer {
        artifact: Some(path.clone()),
        ..MockRenderer::default()
    };

    let mut ok = worker(renderer.clone(), MockSink::default(), MockStats::default());
    ok.deliver(job(event(17))).await.unwrap();
    assert!(!path.exists());

    let mut failing = worker(
        renderer,
        MockSink::failing([FailureKind::Permanent]),
        MockStats::default(),
    );
    failing.deliver(job(event(18))).await.unwrap_err();
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn summary_marks_watched_victim_as_loss() {
    let sink = MockSink::default();
    let mut w = worker(MockRenderer::default(), sink.clone(), MockStats::default())
        .with_watch_config(WatchConfig::new(Some("bar"), None, std::iter::empty::<&str>()));

    w.deliver(job(event(19))).await.unwrap();

    let summaries = sink.summaries.lock().unwrap();
    assert!(summaries[0].starts_with("Loss: Alice (Foo) killed Bob (Bar)"));
    assert!(summaries[0].contains("Loss (est.) 2.5M silver"));
}

#[tokio::test(start_paused = true)]
async fn eligible_jobs_delivered_in_fifo_order() {
    let sink = MockSink::default();
    let mut w = worker(MockRenderer::default(), sink.clone(), MockStats::default());

    for id in [3, 1, 2] {
        w.enqueue(event(id));
    }
    while w.process_next().await {}

    let summaries = sink.summaries.lock().unwrap();
    let ids: Vec<_> = summaries
        .iter()
        .map(|s| s.rsplit('/').next().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["3", "1", "2"]);
}

// ─── Run Loop ───

#[tokio::test(start_paused = true)]
async fn spawned_worker_retries_then_drains() {
    let sink = MockSink::failing([FailureKind::Network, FailureKind::Network]);
    let stats = MockStats::default();
    let w = worker(MockRenderer::default(), sink.clone(), stats.clone());

    let (handle, task) = w.spawn(CancellationToken::new());
    assert!(handle.enqueue(event(20)));
    assert!(handle.enqueue(event(20)));
    drop(handle);

    task.await.unwrap();

    assert_eq!(sink.calls(), 3);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn spawned_worker_stops_on_cancel() {
    let sink = MockSink::always(FailureKind::Network);
    let w = worker(MockRenderer::default(), sink.clone(), MockStats::default());
    let shutdown = CancellationToken::new();

    let (handle, task) = w.spawn(shutdown.clone());
    assert!(handle.enqueue(event(21)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.cancel();

    task.await.unwrap();
    assert!(sink.calls() >= 1);
    assert!(sink.calls() <= 2);
}

#[tokio::test(start_paused = true)]
async fn idle_worker_exits_when_last_handle_drops() {
    let sink = MockSink::default();
    let w = worker(MockRenderer::default(), sink.clone(), MockStats::default());

    let (handle, task) = w.spawn(CancellationToken::new());
    let scanner_side = handle.clone();
    drop(handle);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!task.is_finished());

    assert!(scanner_side.enqueue(event(22)));
    drop(scanner_side);

    task.await.unwrap();
    assert_eq!(sink.calls(), 1);
}
