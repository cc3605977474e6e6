use std::path::PathBuf;

use serde_json::json;

use draft_etl::config::Config;
use draft_etl::gold_dimensions::{self, DimPlayer};
use draft_etl::gold_facts::{
    self, FactManagerPick, FactPlayerPerformance, ManagerGameweekPerformance,
};
use draft_etl::merge::{self, MergedGameweekRow};
use draft_etl::silver::{self, GwStatRow, PlayerRow};
use draft_etl::store;

fn scratch_config(name: &str) -> Config {
    let dir: PathBuf = std::env::temp_dir().join(format!(
        "draft-etl-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let config = Config::new(dir);
    config.ensure_directories().unwrap();
    config
}

fn seed_bronze(config: &Config) {
    store::write_json_value(
        &config.bronze_league_raw(),
        &json!({
            "league_entries": [
                {"entry_id": 100, "id": 1, "player_first_name": "Ann",
                 "player_last_name": "Ode", "entry_name": "Alpha FC"},
                {"entry_id": 200, "id": 2, "player_first_name": "Ben",
                 "player_last_name": "Ray", "entry_name": "Beta FC"}
            ]
        }),
    )
    .unwrap();
    store::write_json_value(
        &config.bronze_players_raw(),
        &json!({
            "teams": [{"id": 5, "name": "Arsenal", "short_name": "ARS"}],
            "elements": [
                {"id": 1, "web_name": "Raya", "first_name": "David",
                 "second_name": "Raya", "team": 5, "element_type": 1,
                 "total_points": 6, "minutes": 90},
                {"id": 2, "web_name": "Havertz", "first_name": "Kai",
                 "second_name": "Havertz", "team": 5, "element_type": 4,
                 "total_points": 2, "minutes": 45}
            ],
            "events": [
                {"id": 1, "name": "Gameweek 1", "finished": false,
                 "deadline_time": "2026-08-15T17:30:00Z"}
            ]
        }),
    )
    .unwrap();
    store::write_json_value(
        &config.bronze_gameweek_path(1),
        &json!({
            "elements": {
                "1": {"stats": {"total_points": 6, "minutes": 90, "clean_sheets": 1}},
                "2": {"stats": {"total_points": 2, "minutes": 45}}
            }
        }),
    )
    .unwrap();
    store::write_json_value(
        &config.bronze_picks_path(1, 100),
        &json!({"picks": [{"element": 1, "position": 1}]}),
    )
    .unwrap();
}

#[test]
fn first_full_build_produces_the_whole_model() {
    let config = scratch_config("star-first-build");
    seed_bronze(&config);

    let league = silver::transform_league_standings(&config).unwrap();
    silver::transform_players_data(&config).unwrap();
    silver::transform_fixtures(&config).unwrap();
    let merged = merge::transform_gameweek(&config, 1, &[100, 200], &league).unwrap();
    assert_eq!(merged.len(), 2);

    let dims = gold_dimensions::create_all_dimensions(&config).unwrap();
    assert_eq!(dims.clubs.len(), 1);
    assert_eq!(dims.clubs[0].club_id, 5);
    assert_eq!(dims.clubs[0].club_name, "Arsenal");
    assert_eq!(dims.managers.len(), 2);
    // First build keys every player by its natural id.
    assert_eq!(dims.players.len(), 2);
    for row in &dims.players {
        assert_eq!(row.player_key, row.player.player_id);
        assert_eq!(row.club_id, Some(5));
        assert!(row.is_current);
    }
    let current: Vec<u32> = dims
        .gameweeks
        .iter()
        .filter(|g| g.is_current)
        .map(|g| g.gameweek_id)
        .collect();
    assert_eq!(current, vec![1]);

    gold_facts::create_all_facts(&config, &dims, false, 2).unwrap();

    let performance: Vec<FactPlayerPerformance> =
        store::read_table(&config.gold_fact_path("fact_player_performance")).unwrap();
    assert_eq!(performance.len(), 2);
    assert_eq!(
        performance.iter().map(|r| r.performance_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    let keeper = performance.iter().find(|r| r.player_id == 1).unwrap();
    assert_eq!(keeper.gw_points, 6);
    assert_eq!(keeper.gw_clean_sheets, 1);
    assert_eq!(keeper.player_key, Some(1));
    assert_eq!(keeper.club_id, Some(5));

    let picks: Vec<FactManagerPick> =
        store::read_table(&config.gold_fact_path("fact_manager_picks")).unwrap();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].manager_id, 100);
    assert_eq!(picks[0].player_id, 1);
    assert_eq!(picks[0].squad_slot, Some(1));

    let denorm: Vec<ManagerGameweekPerformance> =
        store::read_table(&config.gold_fact_path("manager_gameweek_performance")).unwrap();
    assert_eq!(denorm.len(), 1);
    assert_eq!(denorm[0].manager_id, 100);
    assert_eq!(denorm[0].player_name.as_deref(), Some("Raya"));
    assert_eq!(denorm[0].player_position.as_deref(), Some("GK"));
    assert_eq!(denorm[0].club_name.as_deref(), Some("Arsenal"));
    assert_eq!(denorm[0].gw_points, Some(6));
    assert_eq!(denorm[0].is_finished, Some(false));

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}

#[test]
fn rerunning_dimensions_keeps_player_keys_stable() {
    let config = scratch_config("star-key-stability");
    seed_bronze(&config);
    silver::transform_league_standings(&config).unwrap();
    silver::transform_players_data(&config).unwrap();
    silver::transform_fixtures(&config).unwrap();

    let first = gold_dimensions::create_all_dimensions(&config).unwrap();
    let second = gold_dimensions::create_all_dimensions(&config).unwrap();

    assert_eq!(first.players.len(), second.players.len());
    for (a, b) in first.players.iter().zip(&second.players) {
        assert_eq!(a.player_key, b.player_key);
        assert_eq!(a.valid_from, b.valid_from);
        assert!(b.is_current);
    }

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}

fn slice_row(player_id: u64, gameweek: u32, points: i64) -> MergedGameweekRow {
    MergedGameweekRow {
        stats: GwStatRow {
            player_id,
            gameweek,
            gw_points: points,
            ..GwStatRow::default()
        },
        manager_id: None,
        squad_slot: None,
        manager_team_name: None,
    }
}

fn write_slice(config: &Config, gameweek: u32, points: &[(u64, i64)]) {
    let rows: Vec<MergedGameweekRow> = points
        .iter()
        .map(|&(player_id, pts)| slice_row(player_id, gameweek, pts))
        .collect();
    store::write_table(&config.silver_gameweek_path(gameweek), &rows).unwrap();
}

fn dim_player(player_id: u64) -> DimPlayer {
    DimPlayer {
        player_key: player_id,
        club_id: Some(5),
        player: PlayerRow {
            player_id,
            ..PlayerRow::default()
        },
        valid_from: "2026-08-01".to_string(),
        valid_to: None,
        is_current: true,
    }
}

#[test]
fn incremental_fact_merge_converges_to_a_full_rebuild() {
    let config = scratch_config("star-convergence");
    let players = vec![dim_player(1), dim_player(2)];

    write_slice(&config, 1, &[(1, 6), (2, 2)]);
    write_slice(&config, 2, &[(1, 3), (2, 8)]);
    write_slice(&config, 3, &[(1, 1), (2, 0)]);
    gold_facts::create_fact_player_performance(&config, &players, false, 2).unwrap();

    // A late correction lands inside the trailing window and a new gameweek
    // arrives after the previous run.
    write_slice(&config, 3, &[(1, 1), (2, 5)]);
    write_slice(&config, 4, &[(1, 7), (2, 2)]);

    let incremental =
        gold_facts::create_fact_player_performance(&config, &players, true, 2).unwrap();
    let full = gold_facts::create_fact_player_performance(&config, &players, false, 2).unwrap();

    assert_eq!(incremental, full);
    assert_eq!(incremental.len(), 8);
    assert_eq!(
        incremental
            .iter()
            .map(|r| r.performance_id)
            .collect::<Vec<_>>(),
        (1..=8).collect::<Vec<u64>>()
    );
    let corrected = incremental
        .iter()
        .find(|r| r.player_id == 2 && r.gameweek_id == 3)
        .unwrap();
    assert_eq!(corrected.gw_points, 5);

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}

#[test]
fn incremental_merge_without_history_falls_back_to_a_full_build() {
    let config = scratch_config("star-no-history");
    let players = vec![dim_player(1)];
    write_slice(&config, 1, &[(1, 6)]);
    write_slice(&config, 2, &[(1, 3)]);

    let rows = gold_facts::create_fact_player_performance(&config, &players, true, 2).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows.iter().map(|r| r.gameweek_id).collect::<Vec<_>>(),
        vec![1, 2]
    );

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}
