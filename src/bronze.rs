//! Bronze layer: capture upstream payloads verbatim, keyed by resource kind
//! and, for per-slice resources, by gameweek and manager. A slice is only
//! ever replaced by re-fetching that exact key.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{self, ApiClient};
use crate::store;
use crate::values::as_u32_any;

/// Fetch and persist the league-details payload. The league is the spine of
/// the whole run (it names the managers whose picks get captured), so a
/// missing payload is fatal.
pub fn extract_league_raw(config: &Config, client: &ApiClient) -> Result<Value> {
    let url = fetch::league_details_url(config);
    info!("fetching league standings from {url}");
    let data = client
        .fetch_json(&url)?
        .ok_or_else(|| anyhow!("no league data for league id {}", config.league_id))?;
    store::write_json_value(&config.bronze_league_raw(), &data)?;
    info!("bronze: league raw data saved");
    Ok(data)
}

/// Fetch and persist the bootstrap payload (players, teams, events,
/// fixtures in one document). Everything downstream keys off it, so a
/// missing payload is fatal.
pub fn extract_players_raw(config: &Config, client: &ApiClient) -> Result<Value> {
    let url = fetch::bootstrap_url(config);
    info!("fetching player data from {url}");
    let data = client
        .fetch_json(&url)?
        .ok_or_else(|| anyhow!("no player data from bootstrap resource"))?;
    store::write_json_value(&config.bronze_players_raw(), &data)?;
    info!("bronze: player raw data saved");
    Ok(data)
}

/// Cut the fixtures list out of the already-captured bootstrap payload and
/// store it as its own raw artifact. A bootstrap without a fixtures key is
/// logged and skipped; fixtures only feed their own dimension.
pub fn extract_fixtures_raw(config: &Config) -> Result<()> {
    let Some(raw) = store::read_json_value_opt(&config.bronze_players_raw()) else {
        warn!("bootstrap payload not captured yet, skipping fixtures");
        return Ok(());
    };
    let Some(fixtures) = raw.get("fixtures") else {
        warn!("no fixtures data found in bootstrap payload");
        return Ok(());
    };
    store::write_json_value(&config.bronze_fixtures_raw(), fixtures)?;
    let count = fixtures.as_array().map(|a| a.len()).unwrap_or(0);
    info!("bronze: fixtures raw data saved ({count} fixtures)");
    Ok(())
}

/// Current active gameweek from the game-status resource. Guessing here
/// would silently corrupt downstream aggregates, so any failure to resolve
/// it aborts the run.
pub fn current_gameweek(config: &Config, client: &ApiClient) -> Result<u32> {
    let url = fetch::game_status_url(config);
    let data = client
        .fetch_json(&url)?
        .ok_or_else(|| anyhow!("game status resource unavailable"))?;
    data.get("current_event")
        .and_then(as_u32_any)
        .context("game status payload has no current_event")
}

/// Capture one gameweek's live stats. Returns false when the slice yielded
/// no payload; the run continues with the remaining slices.
pub fn extract_gameweek_raw(config: &Config, client: &ApiClient, gameweek: u32) -> Result<bool> {
    let url = fetch::event_live_url(config, gameweek);
    info!("fetching raw gameweek {gameweek} data");
    let Some(data) = client.fetch_json(&url)? else {
        warn!("no data found for gameweek {gameweek}");
        return Ok(false);
    };
    store::write_json_value(&config.bronze_gameweek_path(gameweek), &data)?;
    info!("bronze: gameweek {gameweek} raw data saved");
    Ok(true)
}

/// Capture one manager's picks for one gameweek.
pub fn extract_manager_picks_raw(
    config: &Config,
    client: &ApiClient,
    manager_id: u64,
    gameweek: u32,
) -> Result<bool> {
    let url = fetch::entry_picks_url(config, manager_id, gameweek);
    let Some(data) = client.fetch_json(&url)? else {
        warn!("no picks found for manager {manager_id} in gw {gameweek}");
        return Ok(false);
    };
    store::write_json_value(&config.bronze_picks_path(gameweek, manager_id), &data)?;
    Ok(true)
}

/// Capture the selected slices in ascending gameweek order: live stats
/// first, then every manager's picks for that week.
pub fn extract_slices(
    config: &Config,
    client: &ApiClient,
    slices: &[u32],
    manager_ids: &[u64],
) -> Result<()> {
    for &gameweek in slices {
        extract_gameweek_raw(config, client, gameweek)?;
        let mut captured = 0usize;
        for &manager_id in manager_ids {
            if extract_manager_picks_raw(config, client, manager_id, gameweek)? {
                captured += 1;
            }
        }
        info!(
            "bronze: captured {captured}/{} manager picks for gw {gameweek}",
            manager_ids.len()
        );
    }
    Ok(())
}

/// Manager ids from a league-details payload. An empty roster list makes
/// every downstream join meaningless, so it is fatal.
pub fn manager_ids_from_league(league: &Value) -> Result<Vec<u64>> {
    let entries = league
        .get("league_entries")
        .and_then(|v| v.as_array())
        .context("league payload has no league_entries")?;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(id) = entry.get("entry_id").and_then(crate::values::as_u64_any) {
            out.push(id);
        }
    }
    if out.is_empty() {
        bail!("league roster is empty, refusing to run");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::manager_ids_from_league;
    use serde_json::json;

    #[test]
    fn reads_manager_ids_from_league_entries() {
        let league = json!({
            "league_entries": [
                {"entry_id": 100, "entry_name": "Alpha"},
                {"entry_id": 200, "entry_name": "Beta"},
            ]
        });
        assert_eq!(manager_ids_from_league(&league).unwrap(), vec![100, 200]);
    }

    #[test]
    fn empty_roster_is_fatal() {
        assert!(manager_ids_from_league(&json!({"league_entries": []})).is_err());
        assert!(manager_ids_from_league(&json!({})).is_err());
    }
}
