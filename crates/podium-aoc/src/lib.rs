use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use podium_observability::redact_key;
use podium_types::LeaderboardSnapshot;

pub const DEFAULT_BASE_URL: &str = "https://adventofcode.com";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream rejected the view key")]
    Unauthorized,

    #[error("upstream request failed with status {0}")]
    RemoteFailure(StatusCode),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned an unreadable leaderboard: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Anything that can produce a current leaderboard snapshot. The HTTP
/// handlers depend on this seam rather than on a concrete client.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch(
        &self,
        event_year: &str,
        leaderboard_id: &str,
        view_key: &str,
    ) -> Result<LeaderboardSnapshot, FetchError>;
}

/// Client for the Advent of Code private-leaderboard JSON endpoint.
pub struct AocClient {
    base_url: String,
    client: Client,
}

impl AocClient {
    /// The timeout bounds the whole request so a hung upstream cannot block
    /// a handler indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ScoreSource for AocClient {
    async fn fetch(
        &self,
        event_year: &str,
        leaderboard_id: &str,
        view_key: &str,
    ) -> Result<LeaderboardSnapshot, FetchError> {
        let url = format!(
            "{}/{}/leaderboard/private/view/{}.json",
            self.base_url, event_year, leaderboard_id
        );
        debug!(
            event_year,
            leaderboard_id,
            view_key = %redact_key(view_key),
            "fetching leaderboard"
        );

        let response = self
            .client
            .get(&url)
            .query(&[("view_key", view_key)])
            .send()
            .await?;

        let status = response.status();
        // Upstream signals a bad or missing view key with 400.
        if status == StatusCode::BAD_REQUEST {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::RemoteFailure(status));
        }

        let raw = response.text().await?;
        let snapshot = serde_json::from_str::<LeaderboardSnapshot>(&raw)?;
        debug!(
            event_year,
            leaderboard_id,
            members = snapshot.members.len(),
            "leaderboard fetched"
        );
        Ok(snapshot)
    }
}
