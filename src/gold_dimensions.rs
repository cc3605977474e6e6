//! Gold layer, star-schema dimensions. Build order matters: clubs before
//! players (club key lookup), and every dimension before any fact.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::silver::{FixtureRow, LeagueEntryRow, PlayerRow};
use crate::store;
use crate::values::{as_f64_any, as_i64_any, as_u32_any, as_u64_any};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimClub {
    pub club_id: u64,
    pub club_name: String,
    pub short_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimManager {
    pub manager_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub team_name: String,
    pub waiver_pick: Option<u32>,
    pub created_at: String,
}

/// Versioned player dimension row. The tracked attribute is the player's
///// club: a detected club change closes the current version and appends a
/// new one with a fresh surrogate key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimPlayer {
    pub player_key: u64,
    pub club_id: Option<u64>,
    #[serde(flatten)]
    pub player: PlayerRow,
    pub valid_from: String,
    pub valid_to: Option<String>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimGameweek {
    pub gameweek_id: u32,
    pub gameweek_name: String,
    pub deadline_time: Option<String>,
    pub is_finished: bool,
    pub avg_score: Option<f64>,
    pub highest_score: Option<i64>,
    pub gameweek_num: u32,
    pub is_current: bool,
}

/// Fixtures dimension, sourced from the cleaned fixtures table with the
/// column names aligned to the star-schema vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimFixture {
    pub fixture_id: u64,
    pub gameweek_id: Option<u32>,
    pub home_club_id: u64,
    pub away_club_id: u64,
    pub home_difficulty: Option<u32>,
    pub away_difficulty: Option<u32>,
    pub kickoff_time: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub is_finished: bool,
    pub is_started: bool,
}

/// All dimensions from one build, for fact construction to resolve keys
/// without re-reading files.
pub struct Dimensions {
    pub clubs: Vec<DimClub>,
    pub managers: Vec<DimManager>,
    pub players: Vec<DimPlayer>,
    pub gameweeks: Vec<DimGameweek>,
    pub fixtures: Vec<DimFixture>,
}

/// Clubs from the team list embedded in the bootstrap payload. The club's
/// numeric id doubles as its surrogate key.
pub fn clubs_from_bootstrap(raw: &Value, created_at: &str) -> Vec<DimClub> {
    let Some(teams) = raw.get("teams").and_then(|v| v.as_array()) else {
        warn!("no teams data found in bootstrap payload");
        return Vec::new();
    };
    teams
        .iter()
        .filter_map(|team| {
            Some(DimClub {
                club_id: team.get("id").and_then(as_u64_any)?,
                club_name: team
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                short_name: team
                    .get("short_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                created_at: created_at.to_string(),
            })
        })
        .collect()
}

pub fn managers_from_league(league: &[LeagueEntryRow], created_at: &str) -> Vec<DimManager> {
    league
        .iter()
        .map(|entry| DimManager {
            manager_id: entry.manager_id,
            first_name: entry.first_name.clone(),
            last_name: entry.last_name.clone(),
            team_name: entry.team_name.clone(),
            waiver_pick: entry.waiver_pick,
            created_at: created_at.to_string(),
        })
        .collect()
}

/// Versioned merge of the player feed into the existing dimension. A first
/// build keys every row by its natural player id; later versions take keys
/// past the current maximum so the history stays unique.
pub fn merge_dim_players(
    existing: Vec<DimPlayer>,
    players: &[PlayerRow],
    clubs: &[DimClub],
    today: &str,
) -> Vec<DimPlayer> {
    let club_by_short: HashMap<&str, u64> = clubs
        .iter()
        .map(|club| (club.short_name.as_str(), club.club_id))
        .collect();
    let club_id_for = |player: &PlayerRow| {
        player
            .team
            .as_deref()
            .and_then(|short| club_by_short.get(short).copied())
    };

    let mut rows = existing;
    // On the first build the natural key is the surrogate key; new versions
    // after that take keys past the current maximum so history stays unique.
    let first_build = rows.is_empty();
    let mut next_key = rows.iter().map(|r| r.player_key).max().unwrap_or(0) + 1;
    let current_index: HashMap<u64, usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_current)
        .map(|(idx, row)| (row.player.player_id, idx))
        .collect();

    for player in players {
        let club_id = club_id_for(player);
        match current_index.get(&player.player_id) {
            Some(&idx) if rows[idx].club_id == club_id => {
                // Same club: refresh the accumulated attributes in place,
                // keeping the version's key and validity window.
                rows[idx].player = player.clone();
            }
            Some(&idx) => {
                // Club changed: close the current version and append a new
                // one starting today.
                rows[idx].valid_to = Some(today.to_string());
                rows[idx].is_current = false;
                let key = next_key;
                next_key += 1;
                rows.push(new_player_version(key, club_id, player.clone(), today));
            }
            None => {
                let key = if first_build {
                    player.player_id
                } else {
                    let key = next_key;
                    next_key += 1;
                    key
                };
                rows.push(new_player_version(key, club_id, player.clone(), today));
            }
        }
    }
    rows
}

fn new_player_version(key: u64, club_id: Option<u64>, player: PlayerRow, today: &str) -> DimPlayer {
    DimPlayer {
        player_key: key,
        club_id,
        player,
        valid_from: today.to_string(),
        valid_to: None,
        is_current: true,
    }
}

/// Gameweeks from the bootstrap event list. The current gameweek is derived
/// locally as one past the highest finished one; the live API's own
/// current-event marker can lag what the captured data already shows.
pub fn gameweeks_from_bootstrap(raw: &Value) -> Vec<DimGameweek> {
    let Some(events) = raw.get("events").and_then(|v| v.as_array()) else {
        warn!("no gameweek data found in bootstrap payload");
        return Vec::new();
    };
    let mut rows: Vec<DimGameweek> = events
        .iter()
        .filter_map(|event| {
            let gameweek_id = event.get("id").and_then(as_u32_any)?;
            Some(DimGameweek {
                gameweek_id,
                gameweek_name: event
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                deadline_time: event
                    .get("deadline_time")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                is_finished: event
                    .get("finished")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                avg_score: event.get("average_entry_score").and_then(as_f64_any),
                highest_score: event.get("highest_score").and_then(as_i64_any),
                gameweek_num: gameweek_id,
                is_current: false,
            })
        })
        .collect();
    let current = rows
        .iter()
        .filter(|r| r.is_finished)
        .map(|r| r.gameweek_id)
        .max()
        .map(|gw| gw + 1)
        .unwrap_or(1);
    for row in &mut rows {
        row.is_current = row.gameweek_id == current;
    }
    rows
}

pub fn fixtures_dimension(fixtures: &[FixtureRow]) -> Vec<DimFixture> {
    fixtures
        .iter()
        .map(|f| DimFixture {
            fixture_id: f.fixture_id,
            gameweek_id: f.gameweek,
            home_club_id: f.home_team_id as u64,
            away_club_id: f.away_team_id as u64,
            home_difficulty: f.home_difficulty,
            away_difficulty: f.away_difficulty,
            kickoff_time: f.kickoff_time.clone(),
            home_score: f.home_score,
            away_score: f.away_score,
            is_finished: f.finished,
            is_started: f.started,
        })
        .collect()
}

/// Build and persist every dimension in dependency order.
pub fn create_all_dimensions(config: &Config) -> Result<Dimensions> {
    info!("creating dimensional model: dimensions");
    let now = Utc::now().to_rfc3339();
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let bootstrap = store::read_json_value_opt(&config.bronze_players_raw());

    let clubs = bootstrap
        .as_ref()
        .map(|raw| clubs_from_bootstrap(raw, &now))
        .unwrap_or_default();
    store::write_table(&config.gold_dimension_path("dim_clubs"), &clubs)?;
    info!("dim_clubs created: {} clubs", clubs.len());

    let league: Vec<LeagueEntryRow> = store::read_table_opt(&config.silver_league_path())?
        .unwrap_or_default();
    let managers = managers_from_league(&league, &now);
    store::write_table(&config.gold_dimension_path("dim_managers"), &managers)?;
    info!("dim_managers created: {} managers", managers.len());

    let silver_players: Vec<PlayerRow> = store::read_table_opt(&config.silver_players_path())?
        .unwrap_or_default();
    let existing: Vec<DimPlayer> = store::read_table_opt(&config.gold_dimension_path("dim_players"))?
        .unwrap_or_default();
    let players = merge_dim_players(existing, &silver_players, &clubs, &today);
    store::write_table(&config.gold_dimension_path("dim_players"), &players)?;
    info!("dim_players created: {} versioned rows", players.len());

    let gameweeks = bootstrap
        .as_ref()
        .map(gameweeks_from_bootstrap)
        .unwrap_or_default();
    store::write_table(&config.gold_dimension_path("dim_gameweeks"), &gameweeks)?;
    info!("dim_gameweeks created: {} gameweeks", gameweeks.len());

    let silver_fixtures: Vec<FixtureRow> = store::read_table_opt(&config.silver_fixtures_path())?
        .unwrap_or_default();
    let fixtures = fixtures_dimension(&silver_fixtures);
    store::write_table(&config.gold_dimension_path("dim_fixtures"), &fixtures)?;
    info!("dim_fixtures created: {} fixtures", fixtures.len());

    Ok(Dimensions {
        clubs,
        managers,
        players,
        gameweeks,
        fixtures,
    })
}
