//! The feed scanner.
//!
//! Each scan pages through the feed newest-first from offset 0 and stops at
//! the first event the cursor already covers, an empty page, or the maximum
//! offset. Matching events not yet handed off are sent to the delivery worker
//! and remembered in the published ledger.
//!
//! The cursor only moves after a scan completes, via one extra confirmation
//! read of offset 0. A scan that aborts on a page failure leaves it where it
//! was, so the next scan re-covers the same range. New events landing between
//! the last page and the confirmation read are skipped over; that window is
//! accepted.
//!
//! Scans never overlap. The state lock doubles as the re-entrancy guard: a
//! trigger that finds it held is a no-op.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::env_var;
use crate::delivery::DeliveryHandle;
use crate::feed::{FeedError, FeedSource, RetryConfig, RetryResult, retry_with_backoff};
use crate::ledger::DedupLedger;
use crate::types::{EventId, KillEvent};
use crate::watch::{WatchConfig, matches};

use super::cursor::ScanCursor;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_PAGE_SIZE: u32 = 51;
const DEFAULT_MAX_OFFSET: u32 = 1000;
const DEFAULT_PUBLISHED_CAPACITY: usize = 500;

/// Configuration for the feed scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Pause between the end of one scan and the start of the next.
    ///
    /// Default: 60 seconds. Configure via `KILLBOARD_POLL_INTERVAL_SECS`.
    pub poll_interval: Duration,

    /// Events requested per page. Configure via `KILLBOARD_PAGE_SIZE`.
    pub page_size: u32,

    /// Highest offset requested (inclusive). Configure via `KILLBOARD_MAX_OFFSET`.
    pub max_offset: u32,

    /// Per-page retry policy.
    pub retry: RetryConfig,

    /// Number of handed-off ids remembered.
    pub published_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
            retry: RetryConfig::DEFAULT,
            published_capacity: DEFAULT_PUBLISHED_CAPACITY,
        }
    }
}

impl ScanConfig {
    /// Creates a `ScanConfig` from environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults. A page size of
    /// zero is treated as unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        ScanConfig {
            poll_interval: env_var::<u64>("KILLBOARD_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            page_size: env_var::<u32>("KILLBOARD_PAGE_SIZE")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.page_size),
            max_offset: env_var("KILLBOARD_MAX_OFFSET").unwrap_or(defaults.max_offset),
            ..defaults
        }
    }

    /// Offsets of the pages one scan may request, in order.
    pub fn offsets(&self) -> impl Iterator<Item = u32> {
        (0..=self.max_offset).step_by(self.page_size.max(1) as usize)
    }
}

/// Why a scan was abandoned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan aborted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: FeedError,
    },

    #[error("scan aborted: {0}")]
    Feed(#[source] FeedError),
}

impl ScanError {
    /// The offset whose fetch failed.
    pub fn offset(&self) -> u32 {
        match self {
            ScanError::RetriesExhausted { source, .. } => source.offset,
            ScanError::Feed(source) => source.offset,
        }
    }
}

/// Counters for one completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Events returned across all pages.
    pub seen: usize,
    /// Events newer than the cursor.
    pub fresh: usize,
    pub matched: usize,
    /// Matches accepted by the delivery channel.
    pub queued: usize,
    /// Fresh events already handed off or not on the watchlist.
    pub skipped: usize,
    /// The cursor after the confirmation read.
    pub last_seen: EventId,
}

/// State owned by whichever scan currently holds the lock.
#[derive(Debug)]
struct ScanState {
    cursor: ScanCursor,
    published: DedupLedger<EventId>,
}

/// Discovers new events and hands watched ones to the delivery worker.
pub struct FeedScanner<F> {
    config: ScanConfig,
    feed: F,
    watch: WatchConfig,
    delivery: DeliveryHandle,
    state: Mutex<ScanState>,
}

impl<F: FeedSource> FeedScanner<F> {
    pub fn new(config: ScanConfig, feed: F, watch: WatchConfig, delivery: DeliveryHandle) -> Self {
        let state = ScanState {
            cursor: ScanCursor::default(),
            published: DedupLedger::new(config.published_capacity),
        };
        FeedScanner {
            config,
            feed,
            watch,
            delivery,
            state: Mutex::new(state),
        }
    }

    /// Starts from a known stop point instead of an empty cursor.
    pub fn with_cursor(mut self, cursor: ScanCursor) -> Self {
        self.state.get_mut().cursor = cursor;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The committed cursor, or `None` while a scan is running.
    pub fn cursor(&self) -> Option<ScanCursor> {
        self.state.try_lock().ok().map(|state| state.cursor)
    }

    /// Runs one scan unless one is already in progress.
    ///
    /// Returns `None` if another scan holds the guard.
    pub async fn scan_now(&self) -> Option<Result<ScanReport, ScanError>> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Scan already in progress, ignoring trigger");
            return None;
        };

        let result = self.scan(&mut state).await;
        match &result {
            Ok(report) => info!(
                seen = report.seen,
                fresh = report.fresh,
                matched = report.matched,
                queued = report.queued,
                skipped = report.skipped,
                last_seen = %report.last_seen,
                "Scan complete"
            ),
            Err(e) => error!(
                offset = e.offset(),
                last_seen = %state.cursor.last_seen(),
                error = %e,
                "Scan aborted, cursor unchanged"
            ),
        }
        Some(result)
    }

    async fn scan(&self, state: &mut ScanState) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport::default();

        'pages: for offset in self.config.offsets() {
            let page = self.fetch_page(offset).await?;
            if page.is_empty() {
                trace!(offset, "Empty page, end of feed");
                break;
            }
            report.seen += page.len();

            for event in page {
                let id = event.id;
                if id.is_unset() {
                    continue;
                }
                if state.cursor.covers(id) {
                    debug!(offset, event_id = %id, "Reached last seen event");
                    break 'pages;
                }
                report.fresh += 1;

                if state.published.contains(&id) {
                    report.skipped += 1;
                    continue;
                }

                let hit = matches(&event, &self.watch);
                if !hit.ok {
                    trace!(event_id = %id, reason = %hit.reason, "Event not watched");
                    report.skipped += 1;
                    continue;
                }

                report.matched += 1;
                debug!(event_id = %id, reason = %hit.reason, "Event matched watchlist");
                if self.delivery.enqueue(event) {
                    report.queued += 1;
                }
                state.published.insert(id);
            }
        }

        self.confirm(state).await;
        report.last_seen = state.cursor.last_seen();
        Ok(report)
    }

    /// Re-reads the head of the feed and advances the cursor to its newest id.
    async fn confirm(&self, state: &mut ScanState) {
        match self.fetch_page(0).await {
            Ok(head) => {
                if let Some(newest) = head.first()
                    && state.cursor.advance(newest.id)
                {
                    debug!(last_seen = %newest.id, "Advanced scan cursor");
                }
            }
            Err(e) => warn!(error = %e, "Confirmation read failed, cursor unchanged"),
        }
    }

    async fn fetch_page(&self, offset: u32) -> Result<Vec<KillEvent>, ScanError> {
        let result = retry_with_backoff(self.config.retry, || {
            self.feed.fetch_page(self.config.page_size, offset)
        })
        .await;

        match result {
            RetryResult::Success(page) => Ok(page),
            RetryResult::ExhaustedRetries {
                last_error,
                attempts,
            } => Err(ScanError::RetriesExhausted {
                attempts,
                source: last_error,
            }),
            RetryResult::PermanentError(e) => Err(ScanError::Feed(e)),
        }
    }

    // ─── Scheduling Loop ──────────────────────────────────────────────────────────

    /// Scans on the configured interval until shutdown.
    ///
    /// The interval runs from the end of one scan to the start of the next.
    /// Cancellation is observed between scans; a running scan completes.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            page_size = self.config.page_size,
            max_offset = self.config.max_offset,
            "Feed scanner started"
        );

        while !shutdown.is_cancelled() {
            // Failures are logged inside scan_now; the next cycle starts over.
            let _ = self.scan_now().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Feed scanner stopped");
    }
}

impl<F> FeedScanner<F>
where
    F: FeedSource + Send + Sync + 'static,
{
    /// Spawns the scheduling loop on the current runtime.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
