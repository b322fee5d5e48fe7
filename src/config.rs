//! Process configuration, read once from the environment at startup.
//!
//! Every setting has a compiled default. Unset or unparsable variables fall
//! back to it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::delivery::DeliveryConfig;
use crate::feed::DEFAULT_FEED_URL;
use crate::scanner::ScanConfig;
use crate::watch::WatchConfig;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 35;
const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    3000,
);

/// Reads and parses an environment variable, ignoring empty values.
pub(crate) fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| s.trim().parse().ok())
}

/// Builds the watchlist from `KILLBOARD_GUILD`, `KILLBOARD_ALLIANCE` and
/// the comma-separated `KILLBOARD_PLAYERS`.
pub fn watch_config_from_env() -> WatchConfig {
    let guild = std::env::var("KILLBOARD_GUILD").ok();
    let alliance = std::env::var("KILLBOARD_ALLIANCE").ok();
    let players = std::env::var("KILLBOARD_PLAYERS").unwrap_or_default();

    WatchConfig::new(guild.as_deref(), alliance.as_deref(), players.split(','))
}

/// Everything the binary needs to wire the relay together.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub watch: WatchConfig,
    pub scan: ScanConfig,
    pub delivery: DeliveryConfig,

    /// Events endpoint of the feed.
    pub feed_url: String,

    /// Per-request timeout for feed pages.
    pub http_timeout: Duration,

    /// Webhook to publish to. `None` selects the dry-run log sink.
    pub webhook_url: Option<String>,

    /// JSON Lines stats file. `None` disables stats.
    pub stats_path: Option<PathBuf>,

    /// Address of the health endpoint.
    pub listen_addr: SocketAddr,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        RelayConfig {
            watch: watch_config_from_env(),
            scan: ScanConfig::from_env(),
            delivery: DeliveryConfig::default(),
            feed_url: env_var("KILLBOARD_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            http_timeout: env_var::<u64>("KILLBOARD_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            webhook_url: env_var("KILLBOARD_WEBHOOK_URL"),
            stats_path: env_var("KILLBOARD_STATS_PATH"),
            listen_addr: env_var("KILLBOARD_LISTEN_ADDR").unwrap_or(DEFAULT_LISTEN_ADDR),
        }
    }
}
