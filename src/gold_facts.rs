//! Gold layer, star-schema facts. The player-performance fact is the only
//! incrementally merged table: a trailing window of gameweeks is re-derived
//! and spliced over the previously published rows, and the result must be
//! indistinguishable from a full rebuild over the same silver files.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::gold_dimensions::{DimPlayer, Dimensions};
use crate::merge::MergedGameweekRow;
use crate::store;

/// Grain: player x gameweek.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPlayerPerformance {
    pub performance_id: u64,
    pub player_key: Option<u64>,
    pub player_id: u64,
    pub club_id: Option<u64>,
    pub gameweek_id: u32,
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
    #[serde(rename = "gw_xG")]
    pub gw_expected_goals: f64,
    #[serde(rename = "gw_xA")]
    pub gw_expected_assists: f64,
    #[serde(rename = "gw_xGi")]
    pub gw_expected_goal_involvements: f64,
    #[serde(rename = "gw_xGc")]
    pub gw_expected_goals_conceded: f64,
    pub gw_clearances_blocks_interceptions: i64,
    pub gw_recoveries: i64,
    pub gw_tackles: i64,
    pub gw_defensive_contribution: i64,
    pub gw_starts: i64,
    pub gw_in_dreamteam: bool,
}

/// Grain: manager x player x gameweek.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactManagerPick {
    pub pick_id: u64,
    pub manager_id: u64,
    pub player_id: u64,
    pub gameweek_id: u32,
    pub squad_slot: Option<u32>,
}

/// Grain: player, current-season snapshot. This is the upstream's own
/// season-to-date accumulation, not a sum over the per-gameweek fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactPlayerSeasonStats {
    pub seasonal_stats_id: u64,
    pub player_key: u64,
    pub player_id: u64,
    pub club_id: Option<u64>,
    pub name: String,
    pub position: Option<String>,
    pub total_points: i64,
    pub minutes: i64,
    pub goals: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub goals_conceded: i64,
    pub own_goals: i64,
    pub penalties_saved: i64,
    pub penalties_missed: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub saves: i64,
    pub bonus: i64,
    pub bps: i64,
    pub influence: f64,
    pub creativity: f64,
    pub threat: f64,
    pub ict_index: f64,
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
    pub form: f64,
    pub starts: i64,
}

/// Denormalized manager view, grain: manager x player x gameweek, sorted by
/// gameweek, manager, squad slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerGameweekPerformance {
    pub gameweek_num: u32,
    pub manager_id: u64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub manager_team_name: Option<String>,
    pub player_id: u64,
    pub player_name: Option<String>,
    pub player_position: Option<String>,
    pub club_name: Option<String>,
    pub club_short_name: Option<String>,
    pub squad_slot: Option<u32>,
    pub gw_points: Option<i64>,
    pub gw_minutes: Option<i64>,
    pub gw_goals: Option<i64>,
    pub gw_assists: Option<i64>,
    pub gw_clean_sheets: Option<i64>,
    pub gw_bonus: Option<i64>,
    pub is_finished: Option<bool>,
}

/// (player_key, club_id) per player id, from the current dimension rows.
fn player_lookup(players: &[DimPlayer]) -> HashMap<u64, (u64, Option<u64>)> {
    players
        .iter()
        .filter(|row| row.is_current)
        .map(|row| (row.player.player_id, (row.player_key, row.club_id)))
        .collect()
}

/// One fact row per (player, gameweek) from a silver slice. The slice fans
/// out one row per picking manager, so collapse the duplicates first.
fn performance_rows_from_slice(
    rows: &[MergedGameweekRow],
    lookup: &HashMap<u64, (u64, Option<u64>)>,
) -> Vec<FactPlayerPerformance> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.stats.player_id))
        .map(|row| {
            let stats = &row.stats;
            let keys = lookup.get(&stats.player_id);
            FactPlayerPerformance {
                performance_id: 0,
                player_key: keys.map(|(key, _)| *key),
                player_id: stats.player_id,
                club_id: keys.and_then(|(_, club)| *club),
                gameweek_id: stats.gameweek,
                gw_points: stats.gw_points,
                gw_minutes: stats.gw_minutes,
                gw_goals: stats.gw_goals,
                gw_assists: stats.gw_assists,
                gw_clean_sheets: stats.gw_clean_sheets,
                gw_goals_conceded: stats.gw_goals_conceded,
                gw_bonus: stats.gw_bonus,
                gw_bps: stats.gw_bps,
                gw_saves: stats.gw_saves,
                gw_penalties_saved: stats.gw_penalties_saved,
                gw_yellow_cards: stats.gw_yellow_cards,
                gw_red_cards: stats.gw_red_cards,
                gw_own_goals: stats.gw_own_goals,
                gw_penalties_missed: stats.gw_penalties_missed,
                gw_influence: stats.gw_influence,
                gw_creativity: stats.gw_creativity,
                gw_threat: stats.gw_threat,
                gw_ict_index: stats.gw_ict_index,
                gw_expected_goals: stats.gw_expected_goals,
                gw_expected_assists: stats.gw_expected_assists,
                gw_expected_goal_involvements: stats.gw_expected_goal_involvements,
                gw_expected_goals_conceded: stats.gw_expected_goals_conceded,
                gw_clearances_blocks_interceptions: stats.gw_clearances_blocks_interceptions,
                gw_recoveries: stats.gw_recoveries,
                gw_tackles: stats.gw_tackles,
                gw_defensive_contribution: stats.gw_defensive_contribution,
                gw_starts: stats.gw_starts,
                gw_in_dreamteam: stats.gw_in_dreamteam,
            }
        })
        .collect()
}

/// Build the player-performance fact. Full mode rebuilds from every silver
/// gameweek file. Incremental mode keeps the previously published rows
/// outside the trailing window and re-derives the window plus anything
/// newer — then reassigns the surrogate key as a dense 1..N range over the
/// whole merged table, old rows included, so keys stay contiguous.
pub fn create_fact_player_performance(
    config: &Config,
    players: &[DimPlayer],
    incremental: bool,
    window: u32,
) -> Result<Vec<FactPlayerPerformance>> {
    info!("creating fact_player_performance");
    let mut files = store::silver_gameweek_files(&config.silver_gameweeks_dir())?;
    if files.is_empty() {
        warn!("no gameweek files found");
        return Ok(Vec::new());
    }
    let output_path = config.gold_fact_path("fact_player_performance");
    let lookup = player_lookup(players);

    let mut kept: Vec<FactPlayerPerformance> = Vec::new();
    if incremental {
        let existing: Vec<FactPlayerPerformance> =
            store::read_table_opt(&output_path)?.unwrap_or_default();
        if let Some(max_gw) = existing.iter().map(|r| r.gameweek_id).max() {
            let start_gw = max_gw.saturating_sub(window.saturating_sub(1)).max(1);
            info!("incremental update: rebuilding gw {start_gw} onwards");
            kept = existing
                .into_iter()
                .filter(|r| r.gameweek_id < start_gw)
                .collect();
            files.retain(|(gw, _)| *gw >= start_gw);
        }
    }

    let mut rows = kept;
    for (_, path) in &files {
        let slice: Vec<MergedGameweekRow> = store::read_table(path)?;
        rows.extend(performance_rows_from_slice(&slice, &lookup));
    }
    for (idx, row) in rows.iter_mut().enumerate() {
        row.performance_id = idx as u64 + 1;
    }

    store::write_table(&output_path, &rows)?;
    info!("fact_player_performance created: {} records", rows.len());
    Ok(rows)
}

/// Build the manager-picks fact: always a full rebuild over every silver
/// gameweek file, keeping only rows with an actual pick.
pub fn create_fact_manager_picks(config: &Config) -> Result<Vec<FactManagerPick>> {
    info!("creating fact_manager_picks");
    let files = store::silver_gameweek_files(&config.silver_gameweeks_dir())?;
    if files.is_empty() {
        warn!("no gameweek files found");
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for (_, path) in &files {
        let slice: Vec<MergedGameweekRow> = store::read_table(path)?;
        for row in slice {
            let Some(manager_id) = row.manager_id else {
                continue;
            };
            rows.push(FactManagerPick {
                pick_id: 0,
                manager_id,
                player_id: row.stats.player_id,
                gameweek_id: row.stats.gameweek,
                squad_slot: row.squad_slot,
            });
        }
    }
    for (idx, row) in rows.iter_mut().enumerate() {
        row.pick_id = idx as u64 + 1;
    }

    store::write_table(&config.gold_fact_path("fact_manager_picks"), &rows)?;
    info!("fact_manager_picks created: {} picks", rows.len());
    Ok(rows)
}

/// Build the season-stats snapshot fact: a wide projection of the current
/// player-dimension rows' accumulated columns.
pub fn create_fact_player_season_stats(
    config: &Config,
    players: &[DimPlayer],
) -> Result<Vec<FactPlayerSeasonStats>> {
    info!("creating fact_player_season_stats");
    let mut rows: Vec<FactPlayerSeasonStats> = players
        .iter()
        .filter(|row| row.is_current)
        .map(|row| {
            let p = &row.player;
            FactPlayerSeasonStats {
                seasonal_stats_id: 0,
                player_key: row.player_key,
                player_id: p.player_id,
                club_id: row.club_id,
                name: p.name.clone(),
                position: p.position.map(|pos| pos.label().to_string()),
                total_points: p.total_points,
                minutes: p.minutes,
                goals: p.goals,
                assists: p.assists,
                clean_sheets: p.clean_sheets,
                goals_conceded: p.goals_conceded,
                own_goals: p.extra_i64("own_goals"),
                penalties_saved: p.extra_i64("penalties_saved"),
                penalties_missed: p.extra_i64("penalties_missed"),
                yellow_cards: p.extra_i64("yellow_cards"),
                red_cards: p.extra_i64("red_cards"),
                saves: p.extra_i64("saves"),
                bonus: p.extra_i64("bonus"),
                bps: p.extra_i64("bps"),
                influence: p.extra_f64("influence"),
                creativity: p.extra_f64("creativity"),
                threat: p.extra_f64("threat"),
                ict_index: p.extra_f64("ict_index"),
                expected_goals: p.expected_goals,
                expected_assists: p.expected_assists,
                expected_goal_involvements: p.expected_goal_involvements,
                expected_goals_conceded: p.expected_goals_conceded,
                points_per_game: p.points_per_game,
                form: p.extra_f64("form"),
                starts: p.extra_i64("starts"),
            }
        })
        .collect();
    for (idx, row) in rows.iter_mut().enumerate() {
        row.seasonal_stats_id = idx as u64 + 1;
    }

    store::write_table(&config.gold_fact_path("fact_player_season_stats"), &rows)?;
    info!("fact_player_season_stats created: {} players", rows.len());
    Ok(rows)
}

/// Build the denormalized manager-gameweek view from the two facts and the
/// dimensions. Performance rows join on (player, gameweek); reference rows
/// join on their surrogate keys. Missing lookups leave null columns, never
/// dropped rows.
pub fn create_manager_gameweek_performance(
    config: &Config,
    picks: &[FactManagerPick],
    performance: &[FactPlayerPerformance],
    dims: &Dimensions,
) -> Result<Vec<ManagerGameweekPerformance>> {
    info!("creating manager_gameweek_performance (denormalized)");

    let performance_by_key: HashMap<(u64, u32), &FactPlayerPerformance> = performance
        .iter()
        .map(|row| ((row.player_id, row.gameweek_id), row))
        .collect();
    let managers: HashMap<u64, _> = dims
        .managers
        .iter()
        .map(|m| (m.manager_id, m))
        .collect();
    let players: HashMap<u64, &DimPlayer> = dims
        .players
        .iter()
        .filter(|p| p.is_current)
        .map(|p| (p.player.player_id, p))
        .collect();
    let clubs: HashMap<u64, _> = dims.clubs.iter().map(|c| (c.club_id, c)).collect();
    let gameweeks: HashMap<u32, _> = dims
        .gameweeks
        .iter()
        .map(|g| (g.gameweek_id, g))
        .collect();

    let mut rows: Vec<ManagerGameweekPerformance> = picks
        .iter()
        .map(|pick| {
            let perf = performance_by_key
                .get(&(pick.player_id, pick.gameweek_id))
                .copied();
            let manager = managers.get(&pick.manager_id).copied();
            let player = players.get(&pick.player_id).copied();
            let club = player
                .and_then(|p| p.club_id)
                .and_then(|id| clubs.get(&id).copied());
            let gameweek = gameweeks.get(&pick.gameweek_id).copied();
            ManagerGameweekPerformance {
                gameweek_num: pick.gameweek_id,
                manager_id: pick.manager_id,
                first_name: manager.map(|m| m.first_name.clone()),
                last_name: manager.map(|m| m.last_name.clone()),
                manager_team_name: manager.map(|m| m.team_name.clone()),
                player_id: pick.player_id,
                player_name: player.map(|p| p.player.name.clone()),
                player_position: player
                    .and_then(|p| p.player.position.map(|pos| pos.label().to_string())),
                club_name: club.map(|c| c.club_name.clone()),
                club_short_name: club.map(|c| c.short_name.clone()),
                squad_slot: pick.squad_slot,
                gw_points: perf.map(|p| p.gw_points),
                gw_minutes: perf.map(|p| p.gw_minutes),
                gw_goals: perf.map(|p| p.gw_goals),
                gw_assists: perf.map(|p| p.gw_assists),
                gw_clean_sheets: perf.map(|p| p.gw_clean_sheets),
                gw_bonus: perf.map(|p| p.gw_bonus),
                is_finished: gameweek.map(|g| g.is_finished),
            }
        })
        .collect();
    rows.sort_by_key(|row| (row.gameweek_num, row.manager_id, row.squad_slot));

    store::write_table(
        &config.gold_fact_path("manager_gameweek_performance"),
        &rows,
    )?;
    info!(
        "manager_gameweek_performance created: {} records",
        rows.len()
    );
    Ok(rows)
}

/// Build every fact in dependency order: performance fact first (the
/// denormalized table reads it), picks and season snapshot, then the
/// denormalized view.
pub fn create_all_facts(
    config: &Config,
    dims: &Dimensions,
    incremental: bool,
    window: u32,
) -> Result<()> {
    info!("creating dimensional model: facts");
    let performance = create_fact_player_performance(config, &dims.players, incremental, window)?;
    let picks = create_fact_manager_picks(config)?;
    create_fact_player_season_stats(config, &dims.players)?;
    create_manager_gameweek_performance(config, &picks, &performance, dims)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silver::{GwStatRow, PlayerRow};

    fn pick_row(player_id: u64, manager_id: u64, points: i64) -> MergedGameweekRow {
        MergedGameweekRow {
            stats: GwStatRow {
                player_id,
                gameweek: 3,
                gw_points: points,
                ..GwStatRow::default()
            },
            manager_id: Some(manager_id),
            squad_slot: Some(1),
            manager_team_name: None,
        }
    }

    fn dim_player(player_id: u64, player_key: u64, club_id: Option<u64>) -> DimPlayer {
        DimPlayer {
            player_key,
            club_id,
            player: PlayerRow {
                player_id,
                ..PlayerRow::default()
            },
            valid_from: "2026-08-01".into(),
            valid_to: None,
            is_current: true,
        }
    }

    #[test]
    fn performance_rows_collapse_pick_fanout() {
        let slice = vec![pick_row(7, 100, 9), pick_row(7, 200, 9), pick_row(8, 100, 2)];
        let lookup = player_lookup(&[dim_player(7, 7, Some(5))]);

        let rows = performance_rows_from_slice(&slice, &lookup);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].player_id, 7);
        assert_eq!(rows[0].gw_points, 9);
        assert_eq!(rows[0].player_key, Some(7));
        assert_eq!(rows[0].club_id, Some(5));
    }

    #[test]
    fn performance_rows_keep_players_missing_from_dimension() {
        let slice = vec![pick_row(99, 100, 3)];
        let lookup = player_lookup(&[]);

        let rows = performance_rows_from_slice(&slice, &lookup);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_key, None);
        assert_eq!(rows[0].club_id, None);
    }

    #[test]
    fn player_lookup_ignores_closed_versions() {
        let mut old = dim_player(7, 7, Some(5));
        old.is_current = false;
        old.valid_to = Some("2026-08-15".into());
        let current = dim_player(7, 31, Some(9));

        let lookup = player_lookup(&[old, current]);
        assert_eq!(lookup.get(&7), Some(&(31, Some(9))));
    }

    #[test]
    fn season_stats_projects_passthrough_columns() {
        let mut row = dim_player(7, 7, Some(5));
        row.player.name = "Saka".into();
        row.player.total_points = 42;
        row.player
            .extra
            .insert("bonus".into(), serde_json::json!(6));
        row.player
            .extra
            .insert("ict_index".into(), serde_json::json!("112.4"));

        let dir = std::env::temp_dir().join("draft-etl-fact-season-test");
        let config = Config::new(&dir);
        config.ensure_directories().unwrap();
        let rows = create_fact_player_season_stats(&config, &[row]).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seasonal_stats_id, 1);
        assert_eq!(rows[0].name, "Saka");
        assert_eq!(rows[0].total_points, 42);
        assert_eq!(rows[0].bonus, 6);
        assert_eq!(rows[0].ict_index, 112.4);
    }
}
