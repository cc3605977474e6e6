//! Gameweek merger: joins one gameweek's player stats with every manager's
//! picks for that week. Left join from stats, so a stat row is never lost to
//! a missing pick or reference entry.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::silver::{self, GwStatRow, LeagueEntryRow, PickRow};
use crate::store;

/// The canonical per-slice output all aggregates derive from: one row per
/// (player, manager-or-none, gameweek). Unpicked players carry null manager
/// fields; a player picked by several managers fans out to one row per pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedGameweekRow {
    #[serde(flatten)]
    pub stats: GwStatRow,
    pub manager_id: Option<u64>,
    pub squad_slot: Option<u32>,
    pub manager_team_name: Option<String>,
}

/// Join stats with picks on (player, gameweek), then enrich each picked row
/// with the manager's display team name looked up in the league-standings
/// table by manager id.
pub fn merge_gameweek(
    stats: Vec<GwStatRow>,
    picks: &[PickRow],
    league: &[LeagueEntryRow],
) -> Vec<MergedGameweekRow> {
    let mut picks_by_player: HashMap<u64, Vec<&PickRow>> = HashMap::new();
    for pick in picks {
        picks_by_player.entry(pick.player_id).or_default().push(pick);
    }
    let team_names: HashMap<u64, &str> = league
        .iter()
        .map(|entry| (entry.manager_id, entry.team_name.as_str()))
        .collect();

    let mut out = Vec::with_capacity(stats.len());
    for stat in stats {
        match picks_by_player.get(&stat.player_id) {
            Some(player_picks) => {
                for pick in player_picks {
                    out.push(MergedGameweekRow {
                        stats: stat.clone(),
                        manager_id: Some(pick.manager_id),
                        squad_slot: pick.squad_slot,
                        manager_team_name: team_names
                            .get(&pick.manager_id)
                            .map(|name| name.to_string()),
                    });
                }
            }
            None => out.push(MergedGameweekRow {
                stats: stat,
                manager_id: None,
                squad_slot: None,
                manager_team_name: None,
            }),
        }
    }
    out
}

/// Bronze -> Silver for one gameweek slice: clean the live stats, load the
/// managers' picks, merge, and persist the slice file.
pub fn transform_gameweek(
    config: &Config,
    gameweek: u32,
    manager_ids: &[u64],
    league: &[LeagueEntryRow],
) -> Result<Vec<MergedGameweekRow>> {
    info!("transforming gameweek {gameweek} data (bronze -> silver)");
    let stats = store::read_json_value_opt(&config.bronze_gameweek_path(gameweek))
        .map(|raw| silver::gameweek_stats_from_payload(&raw, gameweek))
        .unwrap_or_default();
    let picks = silver::load_gameweek_picks(config, gameweek, manager_ids);
    let merged = merge_gameweek(stats, &picks, league);
    store::write_table(&config.silver_gameweek_path(gameweek), &merged)?;
    info!(
        "silver: gameweek {gameweek} saved ({} rows, {} picks)",
        merged.len(),
        picks.len()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(player_id: u64, gameweek: u32, points: i64) -> GwStatRow {
        GwStatRow {
            player_id,
            gameweek,
            gw_points: points,
            gw_minutes: 0,
            gw_goals: 0,
            gw_assists: 0,
            gw_clean_sheets: 0,
            gw_goals_conceded: 0,
            gw_bonus: 0,
            gw_bps: 0,
            gw_saves: 0,
            gw_penalties_saved: 0,
            gw_yellow_cards: 0,
            gw_red_cards: 0,
            gw_own_goals: 0,
            gw_penalties_missed: 0,
            gw_influence: 0.0,
            gw_creativity: 0.0,
            gw_threat: 0.0,
            gw_ict_index: 0.0,
            gw_expected_goals: 0.0,
            gw_expected_assists: 0.0,
            gw_expected_goal_involvements: 0.0,
            gw_expected_goals_conceded: 0.0,
            gw_clearances_blocks_interceptions: 0,
            gw_recoveries: 0,
            gw_tackles: 0,
            gw_defensive_contribution: 0,
            gw_starts: 0,
            gw_in_dreamteam: false,
        }
    }

    fn pick(player_id: u64, manager_id: u64, slot: u32) -> PickRow {
        PickRow {
            player_id,
            gameweek: 1,
            manager_id,
            squad_slot: Some(slot),
        }
    }

    fn entrant(manager_id: u64, team_name: &str) -> LeagueEntryRow {
        LeagueEntryRow {
            manager_id,
            id: manager_id,
            first_name: String::new(),
            last_name: String::new(),
            short_name: String::new(),
            waiver_pick: None,
            team_name: team_name.to_string(),
        }
    }

    #[test]
    fn unpicked_players_keep_their_stat_row_with_null_manager() {
        let merged = merge_gameweek(
            vec![stat(1, 1, 6), stat(2, 1, 2)],
            &[pick(1, 100, 1)],
            &[entrant(100, "Alpha")],
        );
        assert_eq!(merged.len(), 2);
        let picked = merged.iter().find(|r| r.stats.player_id == 1).unwrap();
        assert_eq!(picked.manager_id, Some(100));
        assert_eq!(picked.squad_slot, Some(1));
        assert_eq!(picked.manager_team_name.as_deref(), Some("Alpha"));
        let unpicked = merged.iter().find(|r| r.stats.player_id == 2).unwrap();
        assert_eq!(unpicked.manager_id, None);
        assert_eq!(unpicked.squad_slot, None);
        assert_eq!(unpicked.manager_team_name, None);
    }

    #[test]
    fn multiple_managers_fan_out_to_one_row_per_pick() {
        let merged = merge_gameweek(
            vec![stat(7, 1, 9)],
            &[pick(7, 100, 3), pick(7, 200, 5)],
            &[entrant(100, "Alpha"), entrant(200, "Beta")],
        );
        assert_eq!(merged.len(), 2);
        let mut managers: Vec<_> = merged.iter().map(|r| r.manager_id.unwrap()).collect();
        managers.sort_unstable();
        assert_eq!(managers, vec![100, 200]);
        for row in &merged {
            assert_eq!(row.stats.player_id, 7);
            assert_eq!(row.stats.gw_points, 9);
        }
    }

    #[test]
    fn unknown_manager_id_leaves_team_name_null_not_dropped() {
        let merged = merge_gameweek(vec![stat(1, 1, 4)], &[pick(1, 999, 2)], &[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].manager_id, Some(999));
        assert_eq!(merged[0].manager_team_name, None);
    }
}
