use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{error, warn};

use crate::config::Config;

/// Blocking API client with a bounded per-request timeout and fixed-delay
/// retries. Constructed once per run and passed into the stages that fetch;
/// exhausted retries yield `Ok(None)` so each call site can decide whether
/// the missing payload is fatal or just skips a slice.
pub struct ApiClient {
    client: Client,
    retry_attempts: u32,
    retry_delay: std::time::Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay,
        })
    }

    /// Fetch a JSON resource, retrying transient failures. Returns `Ok(None)`
    /// once every attempt has failed; a payload that is not valid JSON is a
    /// hard error (the upstream never serves malformed bodies on success).
    pub fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        for attempt in 1..=self.retry_attempts {
            match self.try_fetch(url) {
                Ok(value) => return Ok(Some(value)),
                Err(FetchError::Transient(err)) => {
                    warn!(
                        "attempt {attempt}/{} failed for {url}: {err}",
                        self.retry_attempts
                    );
                    if attempt < self.retry_attempts {
                        std::thread::sleep(self.retry_delay);
                    }
                }
                Err(FetchError::Fatal(err)) => return Err(err),
            }
        }
        error!(
            "failed to fetch {url} after {} attempts",
            self.retry_attempts
        );
        Ok(None)
    }

    fn try_fetch(&self, url: &str) -> std::result::Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Transient(format!("http {status}")));
        }
        let body = resp
            .text()
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        serde_json::from_str::<Value>(body.trim())
            .with_context(|| format!("invalid json from {url}"))
            .map_err(FetchError::Fatal)
    }
}

enum FetchError {
    Transient(String),
    Fatal(anyhow::Error),
}

// Upstream resource URLs, kept in one place next to the client that fetches
// them.

pub fn league_details_url(config: &Config) -> String {
    format!("{}/league/{}/details", config.base_url, config.league_id)
}

pub fn bootstrap_url(config: &Config) -> String {
    format!("{}/bootstrap-static", config.base_url)
}

pub fn game_status_url(config: &Config) -> String {
    format!("{}/game", config.base_url)
}

pub fn event_live_url(config: &Config, gameweek: u32) -> String {
    format!("{}/event/{gameweek}/live", config.base_url)
}

pub fn entry_picks_url(config: &Config, manager_id: u64, gameweek: u32) -> String {
    format!("{}/entry/{manager_id}/event/{gameweek}", config.base_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn urls_embed_league_and_slice_keys() {
        let mut config = Config::new("Data");
        config.league_id = "999".to_string();
        assert_eq!(
            league_details_url(&config),
            "https://draft.premierleague.com/api/league/999/details"
        );
        assert_eq!(
            event_live_url(&config, 12),
            "https://draft.premierleague.com/api/event/12/live"
        );
        assert_eq!(
            entry_picks_url(&config, 42, 12),
            "https://draft.premierleague.com/api/entry/42/event/12"
        );
    }
}
