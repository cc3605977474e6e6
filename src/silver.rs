//! Silver layer: turn raw payloads into normalized tables with a fixed,
//! typed column vocabulary. Each transformer declares its full target
//! schema; optional source fields default explicitly instead of the column
//! disappearing from the output.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::store;
use crate::values::{as_f64_any, as_i64_any, as_u32_any, as_u64_any, stat_bool, stat_f64, stat_i64};

/// Low-value bootstrap columns dropped from the cleaned player table:
/// internal rank breakdowns, per-position rank duplicates, and text-only
/// status/set-piece notes. Everything else passes through losslessly.
const DROPPED_PLAYER_FIELDS: &[&str] = &[
    "influence_rank",
    "influence_rank_type",
    "creativity_rank",
    "creativity_rank_type",
    "threat_rank",
    "threat_rank_type",
    "ict_index_rank",
    "ict_index_rank_type",
    "form_rank",
    "form_rank_type",
    "points_per_game_rank",
    "points_per_game_rank_type",
    "corners_and_indirect_freekicks_order",
    "corners_and_indirect_freekicks_text",
    "direct_freekicks_order",
    "direct_freekicks_text",
    "penalties_order",
    "penalties_text",
    "status",
    "news",
    "news_added",
    "ep_this",
    "ep_next",
    "draft_rank",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "FWD")]
    Forward,
}

impl Position {
    pub fn from_element_type(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Goalkeeper),
            2 => Some(Self::Defender),
            3 => Some(Self::Midfielder),
            4 => Some(Self::Forward),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Goalkeeper => "GK",
            Self::Defender => "DEF",
            Self::Midfielder => "MID",
            Self::Forward => "FWD",
        }
    }
}

/// One entrant in the league.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueEntryRow {
    pub manager_id: u64,
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub short_name: String,
    pub waiver_pick: Option<u32>,
    pub team_name: String,
}

/// One player from the bootstrap payload. The named fields are the stable
/// vocabulary downstream code joins on; every other source column rides
/// along in `extra` (minus the drop-list) so the table stays lossless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerRow {
    pub player_id: u64,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub team_id: u32,
    /// Club short name resolved from the embedded team list.
    pub team: Option<String>,
    pub position: Option<Position>,
    pub total_points: i64,
    pub minutes: i64,
    pub goals: i64,
    pub assists: i64,
    #[serde(rename = "CS")]
    pub clean_sheets: i64,
    #[serde(rename = "Gc")]
    pub goals_conceded: i64,
    #[serde(rename = "xG")]
    pub expected_goals: f64,
    #[serde(rename = "xA")]
    pub expected_assists: f64,
    #[serde(rename = "xGi")]
    pub expected_goal_involvements: f64,
    #[serde(rename = "xGc")]
    pub expected_goals_conceded: f64,
    #[serde(rename = "PpG")]
    pub points_per_game: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerRow {
    /// Integer column from the passthrough map, defaulting to zero.
    pub fn extra_i64(&self, key: &str) -> i64 {
        self.extra.get(key).and_then(as_i64_any).unwrap_or(0)
    }

    /// Float column from the passthrough map, defaulting to zero.
    pub fn extra_f64(&self, key: &str) -> f64 {
        self.extra.get(key).and_then(as_f64_any).unwrap_or(0.0)
    }
}

/// One fixture, scalar fields only. Nested per-fixture structures (player
/// stat breakdowns) belong to a different grain and are dropped here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRow {
    pub fixture_id: u64,
    pub gameweek: Option<u32>,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_difficulty: Option<u32>,
    pub away_difficulty: Option<u32>,
    pub kickoff_time: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub finished: bool,
    pub started: bool,
}

/// Per-gameweek counters for one player. Immutable once the gameweek is
/// finished; re-derived while it is live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GwStatRow {
    pub player_id: u64,
    pub gameweek: u32,
    pub gw_points: i64,
    pub gw_minutes: i64,
    pub gw_goals: i64,
    pub gw_assists: i64,
    pub gw_clean_sheets: i64,
    pub gw_goals_conceded: i64,
    pub gw_bonus: i64,
    pub gw_bps: i64,
    pub gw_saves: i64,
    pub gw_penalties_saved: i64,
    pub gw_yellow_cards: i64,
    pub gw_red_cards: i64,
    pub gw_own_goals: i64,
    pub gw_penalties_missed: i64,
    pub gw_influence: f64,
    pub gw_creativity: f64,
    pub gw_threat: f64,
    pub gw_ict_index: f64,
    pub gw_expected_goals: f64,
    pub gw_expected_assists: f64,
    pub gw_expected_goal_involvements: f64,
    pub gw_expected_goals_conceded: f64,
    pub gw_clearances_blocks_interceptions: i64,
    pub gw_recoveries: i64,
    pub gw_tackles: i64,
    pub gw_defensive_contribution: i64,
    pub gw_starts: i64,
    pub gw_in_dreamteam: bool,
}

/// One (manager, gameweek, player) roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRow {
    pub player_id: u64,
    pub gameweek: u32,
    pub manager_id: u64,
    pub squad_slot: Option<u32>,
}

// ---- transformers ----

/// League-details payload -> one row per entrant.
pub fn transform_league_standings(config: &Config) -> Result<Vec<LeagueEntryRow>> {
    info!("transforming league standings (bronze -> silver)");
    let raw = store::read_json_value_opt(&config.bronze_league_raw());
    let rows = raw
        .as_ref()
        .map(league_rows_from_payload)
        .unwrap_or_default();
    if rows.is_empty() {
        warn!("league payload yielded no entries");
    }
    store::write_table(&config.silver_league_path(), &rows)?;
    info!("silver: league standings saved ({} entrants)", rows.len());
    Ok(rows)
}

pub fn league_rows_from_payload(raw: &Value) -> Vec<LeagueEntryRow> {
    let Some(entries) = raw.get("league_entries").and_then(|v| v.as_array()) else {
        warn!("invalid league data structure: no league_entries");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            Some(LeagueEntryRow {
                manager_id: entry.get("entry_id").and_then(as_u64_any)?,
                id: entry.get("id").and_then(as_u64_any).unwrap_or(0),
                first_name: str_field(entry, "player_first_name"),
                last_name: str_field(entry, "player_last_name"),
                short_name: str_field(entry, "short_name"),
                waiver_pick: entry.get("waiver_pick").and_then(as_u32_any),
                team_name: str_field(entry, "entry_name"),
            })
        })
        .collect()
}

/// Bootstrap payload -> one row per player, with the club code resolved via
/// the embedded team list and the position code mapped onto the 4-value
/// enum.
pub fn transform_players_data(config: &Config) -> Result<Vec<PlayerRow>> {
    info!("transforming player data (bronze -> silver)");
    let raw = store::read_json_value_opt(&config.bronze_players_raw());
    let rows = raw
        .as_ref()
        .map(player_rows_from_payload)
        .unwrap_or_default();
    if rows.is_empty() {
        warn!("bootstrap payload yielded no players");
    }
    store::write_table(&config.silver_players_path(), &rows)?;
    info!("silver: player data saved ({} players)", rows.len());
    Ok(rows)
}

pub fn player_rows_from_payload(raw: &Value) -> Vec<PlayerRow> {
    let Some(elements) = raw.get("elements").and_then(|v| v.as_array()) else {
        warn!("invalid player data structure: no elements");
        return Vec::new();
    };
    let teams = team_short_names(raw);
    elements
        .iter()
        .filter_map(|element| player_row_from_element(element, &teams))
        .collect()
}

/// Club id -> short name, from the team list embedded in the bootstrap
/// payload (not a separate fetch).
pub fn team_short_names(raw: &Value) -> HashMap<u32, String> {
    raw.get("teams")
        .and_then(|v| v.as_array())
        .map(|teams| {
            teams
                .iter()
                .filter_map(|team| {
                    let id = team.get("id").and_then(as_u32_any)?;
                    let short = team.get("short_name").and_then(|v| v.as_str())?;
                    Some((id, short.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn player_row_from_element(element: &Value, teams: &HashMap<u32, String>) -> Option<PlayerRow> {
    let obj = element.as_object()?;
    let player_id = obj.get("id").and_then(as_u64_any)?;
    let team_id = obj.get("team").and_then(as_u32_any).unwrap_or(0);
    let position = obj
        .get("element_type")
        .and_then(as_u32_any)
        .and_then(Position::from_element_type);

    // Everything not renamed into the stable vocabulary and not on the
    // drop-list passes through untouched.
    let mut extra = obj.clone();
    for key in [
        "id",
        "web_name",
        "first_name",
        "second_name",
        "team",
        "element_type",
        "total_points",
        "minutes",
        "goals_scored",
        "assists",
        "clean_sheets",
        "goals_conceded",
        "expected_goals",
        "expected_assists",
        "expected_goal_involvements",
        "expected_goals_conceded",
        "points_per_game",
    ] {
        extra.remove(key);
    }
    for key in DROPPED_PLAYER_FIELDS {
        extra.remove(*key);
    }

    Some(PlayerRow {
        player_id,
        name: str_field(element, "web_name"),
        first_name: str_field(element, "first_name"),
        last_name: str_field(element, "second_name"),
        team_id,
        team: teams.get(&team_id).cloned(),
        position,
        total_points: obj.get("total_points").and_then(as_i64_any).unwrap_or(0),
        minutes: obj.get("minutes").and_then(as_i64_any).unwrap_or(0),
        goals: obj.get("goals_scored").and_then(as_i64_any).unwrap_or(0),
        assists: obj.get("assists").and_then(as_i64_any).unwrap_or(0),
        clean_sheets: obj.get("clean_sheets").and_then(as_i64_any).unwrap_or(0),
        goals_conceded: obj.get("goals_conceded").and_then(as_i64_any).unwrap_or(0),
        expected_goals: obj.get("expected_goals").and_then(as_f64_any).unwrap_or(0.0),
        expected_assists: obj
            .get("expected_assists")
            .and_then(as_f64_any)
            .unwrap_or(0.0),
        expected_goal_involvements: obj
            .get("expected_goal_involvements")
            .and_then(as_f64_any)
            .unwrap_or(0.0),
        expected_goals_conceded: obj
            .get("expected_goals_conceded")
            .and_then(as_f64_any)
            .unwrap_or(0.0),
        points_per_game: obj
            .get("points_per_game")
            .and_then(as_f64_any)
            .unwrap_or(0.0),
        extra,
    })
}

/// Fixtures payload -> one row per fixture, scalars only.
pub fn transform_fixtures(config: &Config) -> Result<Vec<FixtureRow>> {
    info!("transforming fixtures (bronze -> silver)");
    let raw = store::read_json_value_opt(&config.bronze_fixtures_raw());
    let rows = raw
        .as_ref()
        .map(fixture_rows_from_payload)
        .unwrap_or_default();
    if rows.is_empty() {
        warn!("fixtures payload yielded no rows");
    }
    store::write_table(&config.silver_fixtures_path(), &rows)?;
    info!("silver: fixtures saved ({} fixtures)", rows.len());
    Ok(rows)
}

pub fn fixture_rows_from_payload(raw: &Value) -> Vec<FixtureRow> {
    let Some(fixtures) = raw.as_array() else {
        warn!("invalid fixtures structure: expected an array");
        return Vec::new();
    };
    fixtures
        .iter()
        .filter_map(|fixture| {
            Some(FixtureRow {
                fixture_id: fixture.get("id").and_then(as_u64_any)?,
                gameweek: fixture.get("event").and_then(as_u32_any),
                home_team_id: fixture.get("team_h").and_then(as_u32_any)?,
                away_team_id: fixture.get("team_a").and_then(as_u32_any)?,
                home_difficulty: fixture.get("team_h_difficulty").and_then(as_u32_any),
                away_difficulty: fixture.get("team_a_difficulty").and_then(as_u32_any),
                kickoff_time: fixture
                    .get("kickoff_time")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                home_score: fixture.get("team_h_score").and_then(as_i64_any),
                away_score: fixture.get("team_a_score").and_then(as_i64_any),
                finished: fixture
                    .get("finished")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                started: fixture
                    .get("started")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            })
        })
        .collect()
}

/// Gameweek-live payload -> one row per player. The `elements` value is a
/// mapping keyed by player-id-as-string; a stat absent from a player's
/// `stats` object means "did not play" and defaults per field.
pub fn gameweek_stats_from_payload(raw: &Value, gameweek: u32) -> Vec<GwStatRow> {
    let Some(elements) = raw.get("elements").and_then(|v| v.as_object()) else {
        warn!("no gameweek data for gw {gameweek}");
        return Vec::new();
    };
    let mut rows: Vec<GwStatRow> = elements
        .iter()
        .filter_map(|(player_id, player_data)| {
            let player_id: u64 = player_id.trim().parse().ok()?;
            let stats = player_data.get("stats").cloned().unwrap_or(Value::Null);
            Some(gw_stat_row(player_id, gameweek, &stats))
        })
        .collect();
    // Deterministic row order keeps re-derived silver files byte-identical.
    rows.sort_by_key(|row| row.player_id);
    rows
}

fn gw_stat_row(player_id: u64, gameweek: u32, stats: &Value) -> GwStatRow {
    GwStatRow {
        player_id,
        gameweek,
        gw_points: stat_i64(stats, "total_points"),
        gw_minutes: stat_i64(stats, "minutes"),
        gw_goals: stat_i64(stats, "goals_scored"),
        gw_assists: stat_i64(stats, "assists"),
        gw_clean_sheets: stat_i64(stats, "clean_sheets"),
        gw_goals_conceded: stat_i64(stats, "goals_conceded"),
        gw_bonus: stat_i64(stats, "bonus"),
        gw_bps: stat_i64(stats, "bps"),
        gw_saves: stat_i64(stats, "saves"),
        gw_penalties_saved: stat_i64(stats, "penalties_saved"),
        gw_yellow_cards: stat_i64(stats, "yellow_cards"),
        gw_red_cards: stat_i64(stats, "red_cards"),
        gw_own_goals: stat_i64(stats, "own_goals"),
        gw_penalties_missed: stat_i64(stats, "penalties_missed"),
        gw_influence: stat_f64(stats, "influence"),
        gw_creativity: stat_f64(stats, "creativity"),
        gw_threat: stat_f64(stats, "threat"),
        gw_ict_index: stat_f64(stats, "ict_index"),
        gw_expected_goals: stat_f64(stats, "expected_goals"),
        gw_expected_assists: stat_f64(stats, "expected_assists"),
        gw_expected_goal_involvements: stat_f64(stats, "expected_goal_involvements"),
        gw_expected_goals_conceded: stat_f64(stats, "expected_goals_conceded"),
        gw_clearances_blocks_interceptions: stat_i64(stats, "clearances_blocks_interceptions"),
        gw_recoveries: stat_i64(stats, "recoveries"),
        gw_tackles: stat_i64(stats, "tackles"),
        gw_defensive_contribution: stat_i64(stats, "defensive_contribution"),
        gw_starts: stat_i64(stats, "starts"),
        gw_in_dreamteam: stat_bool(stats, "in_dreamteam"),
    }
}

/// Picks payloads for every manager in one gameweek. A manager whose raw
/// file is absent is skipped; duplicate (manager, player) rows collapse to
/// the first slot seen.
pub fn load_gameweek_picks(config: &Config, gameweek: u32, manager_ids: &[u64]) -> Vec<PickRow> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for &manager_id in manager_ids {
        let path = config.bronze_picks_path(gameweek, manager_id);
        let Some(raw) = store::read_json_value_opt(&path) else {
            continue;
        };
        let Some(picks) = raw.get("picks").and_then(|v| v.as_array()) else {
            warn!("picks payload for manager {manager_id} gw {gameweek} has no picks key");
            continue;
        };
        for pick in picks {
            let Some(player_id) = pick.get("element").and_then(as_u64_any) else {
                continue;
            };
            if !seen.insert((manager_id, player_id)) {
                warn!(
                    "duplicate pick for manager {manager_id} player {player_id} gw {gameweek}"
                );
                continue;
            }
            out.push(PickRow {
                player_id,
                gameweek,
                manager_id,
                squad_slot: pick.get("position").and_then(as_u32_any),
            });
        }
    }
    out
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}
