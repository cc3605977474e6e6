//! Gold layer, season aggregates: the enriched full-history dataset and the
//! player/manager rollups derived from it. All of these replay the silver
//! gameweek files in ascending order and are fully rewritten each run.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::merge::MergedGameweekRow;
use crate::silver::{LeagueEntryRow, PlayerRow};
use crate::store;

/// Every merged gameweek row across the season, ascending by gameweek.
pub fn merge_all_gameweeks(config: &Config) -> Result<Vec<MergedGameweekRow>> {
    let files = store::silver_gameweek_files(&config.silver_gameweeks_dir())?;
    if files.is_empty() {
        warn!("no gameweek files found in silver layer");
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for (_, path) in &files {
        let mut rows: Vec<MergedGameweekRow> = store::read_table(path)?;
        out.append(&mut rows);
    }
    info!(
        "silver: merged {} gameweek files into {} records",
        files.len(),
        out.len()
    );
    Ok(out)
}

/// Merged row enriched with player reference columns and manager names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullGameweekRow {
    #[serde(flatten)]
    pub merged: MergedGameweekRow,
    pub player_name: Option<String>,
    pub team: Option<String>,
    pub position: Option<String>,
    /// The player's season-to-date points from the reference table, not a
    /// sum of the per-gameweek rows.
    pub season_points: Option<i64>,
    pub manager_first_name: Option<String>,
    pub manager_last_name: Option<String>,
}

/// Build and persist the main analytics dataset: all merged rows, left
/// joined with the players and league-standings tables, sorted by gameweek
/// ascending then gameweek points descending.
pub fn create_full_gameweek_dataset(config: &Config) -> Result<Vec<FullGameweekRow>> {
    info!("creating gold: full gameweek dataset");
    let gameweeks = merge_all_gameweeks(config)?;
    if gameweeks.is_empty() {
        warn!("no gameweek data available");
        store::write_table::<FullGameweekRow>(&config.gold_gw_data_full(), &[])?;
        return Ok(Vec::new());
    }
    let players: Vec<PlayerRow> = store::read_table_opt(&config.silver_players_path())?
        .unwrap_or_default();
    let league: Vec<LeagueEntryRow> = store::read_table_opt(&config.silver_league_path())?
        .unwrap_or_default();

    let players_by_id: HashMap<u64, &PlayerRow> =
        players.iter().map(|p| (p.player_id, p)).collect();
    let managers_by_id: HashMap<u64, &LeagueEntryRow> =
        league.iter().map(|m| (m.manager_id, m)).collect();

    let mut rows: Vec<FullGameweekRow> = gameweeks
        .into_iter()
        .map(|merged| {
            let player = players_by_id.get(&merged.stats.player_id);
            let manager = merged
                .manager_id
                .and_then(|id| managers_by_id.get(&id).copied());
            FullGameweekRow {
                player_name: player.map(|p| p.name.clone()),
                team: player.and_then(|p| p.team.clone()),
                position: player.and_then(|p| p.position.map(|pos| pos.label().to_string())),
                season_points: player.map(|p| p.total_points),
                manager_first_name: manager.map(|m| m.first_name.clone()),
                manager_last_name: manager.map(|m| m.last_name.clone()),
                merged,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.merged
            .stats
            .gameweek
            .cmp(&b.merged.stats.gameweek)
            .then(b.merged.stats.gw_points.cmp(&a.merged.stats.gw_points))
    });

    store::write_table(&config.gold_gw_data_full(), &rows)?;
    info!("gold: full gameweek dataset saved ({} records)", rows.len());
    Ok(rows)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeasonStatsRow {
    pub player_id: u64,
    pub name: Option<String>,
    pub team: Option<String>,
    pub position: Option<String>,
    pub total_points: i64,
    pub avg_points: f64,
    pub max_points: i64,
    pub min_points: i64,
    /// Sample standard deviation; null for a single gameweek.
    pub std_points: Option<f64>,
    pub total_minutes: i64,
    pub total_goals: i64,
    pub total_assists: i64,
    pub total_clean_sheets: i64,
    pub total_bonus: i64,
    pub gameweeks_played: u32,
    pub points_per_game: f64,
    pub minutes_per_game: f64,
}

/// Aggregate the full dataset per player, sorted by total points descending.
pub fn create_player_season_stats(config: &Config) -> Result<Vec<PlayerSeasonStatsRow>> {
    info!("creating gold: player season statistics");
    let full: Vec<FullGameweekRow> = store::read_table_opt(&config.gold_gw_data_full())?
        .unwrap_or_default();
    if full.is_empty() {
        store::write_table::<PlayerSeasonStatsRow>(&config.gold_player_season_stats(), &[])?;
        return Ok(Vec::new());
    }

    // The fan-out duplicates a stat row per picking manager; collapse back
    // to one observation per (player, gameweek) before aggregating.
    let mut per_player: HashMap<u64, Vec<&FullGameweekRow>> = HashMap::new();
    let mut seen = std::collections::HashSet::new();
    for row in &full {
        if seen.insert((row.merged.stats.player_id, row.merged.stats.gameweek)) {
            per_player
                .entry(row.merged.stats.player_id)
                .or_default()
                .push(row);
        }
    }

    let mut rows: Vec<PlayerSeasonStatsRow> = per_player
        .into_iter()
        .map(|(player_id, observations)| {
            let n = observations.len() as u32;
            let points: Vec<i64> = observations.iter().map(|r| r.merged.stats.gw_points).collect();
            let total_points: i64 = points.iter().sum();
            let avg_points = total_points as f64 / n as f64;
            let total_minutes: i64 = observations.iter().map(|r| r.merged.stats.gw_minutes).sum();
            let first = observations[0];
            PlayerSeasonStatsRow {
                player_id,
                name: first.player_name.clone(),
                team: first.team.clone(),
                position: first.position.clone(),
                total_points,
                avg_points,
                max_points: points.iter().copied().max().unwrap_or(0),
                min_points: points.iter().copied().min().unwrap_or(0),
                std_points: sample_std(&points, avg_points),
                total_minutes,
                total_goals: observations.iter().map(|r| r.merged.stats.gw_goals).sum(),
                total_assists: observations.iter().map(|r| r.merged.stats.gw_assists).sum(),
                total_clean_sheets: observations
                    .iter()
                    .map(|r| r.merged.stats.gw_clean_sheets)
                    .sum(),
                total_bonus: observations.iter().map(|r| r.merged.stats.gw_bonus).sum(),
                gameweeks_played: n,
                points_per_game: round2(total_points as f64 / n as f64),
                minutes_per_game: round2(total_minutes as f64 / n as f64),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.player_id.cmp(&b.player_id))
    });

    store::write_table(&config.gold_player_season_stats(), &rows)?;
    info!("gold: player season stats saved ({} players)", rows.len());
    Ok(rows)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerPerformanceRow {
    pub manager_id: u64,
    pub gameweek: u32,
    pub manager_team_name: Option<String>,
    pub total_gw_points: i64,
    pub players_count: u32,
    pub cumulative_points: i64,
    pub rolling_avg_3gw: f64,
    /// Rank within the gameweek by points, descending; ties share the
    /// minimum rank.
    pub gw_rank: u32,
}

/// Manager standings over time: per (manager, gameweek) totals over picked
/// rows, with cumulative points, a trailing 3-gameweek average, and a
/// per-gameweek rank.
pub fn create_manager_performance(config: &Config) -> Result<Vec<ManagerPerformanceRow>> {
    info!("creating gold: manager performance");
    let full: Vec<FullGameweekRow> = store::read_table_opt(&config.gold_gw_data_full())?
        .unwrap_or_default();

    let mut totals: HashMap<(u64, u32), (i64, u32, Option<String>)> = HashMap::new();
    for row in &full {
        let Some(manager_id) = row.merged.manager_id else {
            continue;
        };
        let entry = totals
            .entry((manager_id, row.merged.stats.gameweek))
            .or_insert((0, 0, row.merged.manager_team_name.clone()));
        entry.0 += row.merged.stats.gw_points;
        entry.1 += 1;
    }

    let mut rows: Vec<ManagerPerformanceRow> = totals
        .into_iter()
        .map(
            |((manager_id, gameweek), (points, count, team_name))| ManagerPerformanceRow {
                manager_id,
                gameweek,
                manager_team_name: team_name,
                total_gw_points: points,
                players_count: count,
                cumulative_points: 0,
                rolling_avg_3gw: 0.0,
                gw_rank: 0,
            },
        )
        .collect();
    rows.sort_by_key(|r| (r.manager_id, r.gameweek));

    // Cumulative points and trailing average per manager, in gameweek order.
    let mut idx = 0;
    while idx < rows.len() {
        let manager_id = rows[idx].manager_id;
        let mut end = idx;
        while end < rows.len() && rows[end].manager_id == manager_id {
            end += 1;
        }
        let mut running = 0i64;
        for i in idx..end {
            running += rows[i].total_gw_points;
            rows[i].cumulative_points = running;
            let window_start = i.saturating_sub(2).max(idx);
            let window: Vec<i64> = rows[window_start..=i]
                .iter()
                .map(|r| r.total_gw_points)
                .collect();
            rows[i].rolling_avg_3gw =
                round2(window.iter().sum::<i64>() as f64 / window.len() as f64);
        }
        idx = end;
    }

    // Rank within each gameweek, descending by points, ties take the
    // minimum rank.
    let mut by_gameweek: HashMap<u32, Vec<(u64, i64)>> = HashMap::new();
    for row in &rows {
        by_gameweek
            .entry(row.gameweek)
            .or_default()
            .push((row.manager_id, row.total_gw_points));
    }
    let mut ranks: HashMap<(u64, u32), u32> = HashMap::new();
    for (gameweek, mut standings) in by_gameweek {
        standings.sort_by(|a, b| b.1.cmp(&a.1));
        let mut rank = 0u32;
        let mut prev_points = None;
        for (position, (manager_id, points)) in standings.iter().enumerate() {
            if prev_points != Some(*points) {
                rank = position as u32 + 1;
                prev_points = Some(*points);
            }
            ranks.insert((*manager_id, gameweek), rank);
        }
    }
    for row in &mut rows {
        row.gw_rank = ranks
            .get(&(row.manager_id, row.gameweek))
            .copied()
            .unwrap_or(0);
    }

    store::write_table(&config.gold_manager_performance(), &rows)?;
    info!("gold: manager performance saved ({} records)", rows.len());
    Ok(rows)
}

fn sample_std(points: &[i64], mean: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let variance = points
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (points.len() - 1) as f64;
    Some(variance.sqrt())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{round2, sample_std};

    #[test]
    fn sample_std_matches_ddof_one() {
        let std = sample_std(&[2, 4, 6], 4.0).unwrap();
        assert!((std - 2.0).abs() < 1e-9);
        assert_eq!(sample_std(&[5], 5.0), None);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(7.0 / 3.0), 2.33);
        assert_eq!(round2(2.5), 2.5);
    }
}
