//! Access to the upstream kill feed.
//!
//! - [`FeedSource`]: the paging seam the scanner polls
//! - [`GameInfoClient`]: the HTTP implementation
//! - [`retry_with_backoff`]: per-page exponential backoff for transient errors

mod client;
mod error;
mod retry;

use std::future::Future;

use crate::types::KillEvent;

pub use client::{DEFAULT_FEED_URL, GameInfoClient};
pub use error::FeedError;
pub use retry::{RetryConfig, RetryResult, retry_with_backoff};

/// A paginated source of kill events, newest first.
///
/// Implementations tag every failure with a retry classification so the
/// scanner never has to inspect error text.
pub trait FeedSource {
    /// Fetches up to `limit` events starting `offset` events from the newest.
    ///
    /// Returns an empty page when `offset` is past the available data.
    fn fetch_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<KillEvent>, FeedError>> + Send;
}
