//! HTTP client for the game-info events endpoint.
//!
//! `GET <base_url>?limit=<n>&offset=<m>` returns a JSON array of kill events,
//! newest first, or an empty array past the end of the available data.

use std::time::Duration;

use reqwest::Client;
use tracing::trace;

use crate::types::KillEvent;

use super::FeedSource;
use super::error::FeedError;

/// Default events endpoint.
pub const DEFAULT_FEED_URL: &str = "https://gameinfo.albiononline.com/api/gameinfo/events";

/// A [`FeedSource`] backed by the public events API.
#[derive(Clone)]
pub struct GameInfoClient {
    client: Client,
    base_url: String,
}

impl GameInfoClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("killboard-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::from_client(client, base_url))
    }

    /// Creates a client from a pre-configured `reqwest::Client`.
    pub fn from_client(client: Client, base_url: impl Into<String>) -> Self {
        GameInfoClient {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl FeedSource for GameInfoClient {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Vec<KillEvent>, FeedError> {
        trace!(limit, offset, "Fetching feed page");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| FeedError::from_reqwest(offset, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::from_status(offset, status.as_u16()));
        }

        response
            .json::<Vec<KillEvent>>()
            .await
            .map_err(|e| FeedError::from_reqwest(offset, e))
    }
}

impl std::fmt::Debug for GameInfoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameInfoClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
