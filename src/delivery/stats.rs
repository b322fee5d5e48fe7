//! Bundled stats recorders.
//!
//! [`JsonlStatsRecorder`] keeps one JSON object per posted event in an
//! append-only JSON Lines file:
//!
//! ```text
//! {"event_id":123,"killer":"Alice",...,"recorded_at":"2024-05-01T12:00:00Z"}
//! ```
//!
//! Each line is fsynced before `record` returns, so a posted event is never
//! missing from the file after a crash. A torn final line from a crash
//! mid-write is the only possible damage. The open, write and fsync run on
//! tokio's blocking pool, off the delivery worker's thread.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{EventId, KillEvent};

use super::collaborators::{Estimate, StatsRecorder};

/// Errors that can occur while recording stats.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stats writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One line of the stats file.
#[derive(Debug, Serialize)]
struct StatsRecord<'a> {
    event_id: EventId,
    killer: &'a str,
    killer_guild: &'a str,
    victim: &'a str,
    victim_guild: &'a str,
    fame: u64,
    estimate: &'a Estimate,
    recorded_at: DateTime<Utc>,
}

/// Appends a record per posted event to a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonlStatsRecorder {
    path: Arc<PathBuf>,
}

impl JsonlStatsRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlStatsRecorder {
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line(event: &KillEvent, estimate: &Estimate) -> Result<String, StatsError> {
        let record = StatsRecord {
            event_id: event.id,
            killer: event.killer.name(),
            killer_guild: event.killer.guild_name(),
            victim: event.victim.name(),
            victim_guild: event.victim.guild_name(),
            fame: event.total_fame,
            estimate,
            recorded_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    }
}

/// Writes `line` with a single `write_all`, so concurrent appends do not interleave.
fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_data()
}

impl StatsRecorder for JsonlStatsRecorder {
    type Error = StatsError;

    async fn record(&self, event: &KillEvent, estimate: &Estimate) -> Result<(), StatsError> {
        let line = Self::line(event, estimate)?;
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || append_line(&path, &line)).await??;
        Ok(())
    }
}

/// Discards every record. Used when no stats file is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStats;

impl StatsRecorder for NoopStats {
    type Error = std::convert::Infallible;

    async fn record(
        &self,
        _event: &KillEvent,
        _estimate: &Estimate,
    ) -> Result<(), std::convert::Infallible> {
        Ok(())
    }
}
