//! Killboard Relay - polls a paginated kill-event feed and relays watched
//! events to a publish sink.
//!
//! A [`scanner::FeedScanner`] discovers new events and filters them against a
//! [`watch::WatchConfig`]. Matches go to a single [`delivery::DeliveryWorker`]
//! that renders, posts and records each one, retrying transient failures.

pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod scanner;
pub mod server;
pub mod types;
pub mod watch;

#[cfg(test)]
pub mod test_utils;
