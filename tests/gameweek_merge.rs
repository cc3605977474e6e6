use std::path::PathBuf;

use serde_json::json;

use draft_etl::config::Config;
use draft_etl::merge::{self, MergedGameweekRow};
use draft_etl::silver::LeagueEntryRow;
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

fn league_entry(manager_id: u64, team_name: &str) -> LeagueEntryRow {
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
fn transform_gameweek_joins_picks_onto_stats() {
    let config = scratch_config("merge-joins");
    store::write_json_value(
        &config.bronze_gameweek_path(1),
        &json!({
            "elements": {
                "1": {"stats": {"total_points": 6, "minutes": 90}},
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
    store::write_json_value(
        &config.bronze_picks_path(1, 200),
        &json!({"picks": [{"element": 1, "position": 3}]}),
    )
    .unwrap();
    let league = vec![league_entry(100, "Alpha FC"), league_entry(200, "Beta FC")];

    let merged = merge::transform_gameweek(&config, 1, &[100, 200], &league).unwrap();

    // Player 1 fans out once per picking manager; player 2 stays unpicked.
    assert_eq!(merged.len(), 3);
    let picked: Vec<&MergedGameweekRow> = merged
        .iter()
        .filter(|row| row.stats.player_id == 1)
        .collect();
    assert_eq!(picked.len(), 2);
    for row in &picked {
        assert_eq!(row.stats.gw_points, 6);
    }
    let alpha = picked.iter().find(|r| r.manager_id == Some(100)).unwrap();
    assert_eq!(alpha.squad_slot, Some(1));
    assert_eq!(alpha.manager_team_name.as_deref(), Some("Alpha FC"));

    let unpicked = merged.iter().find(|r| r.stats.player_id == 2).unwrap();
    assert_eq!(unpicked.manager_id, None);
    assert_eq!(unpicked.squad_slot, None);
    assert_eq!(unpicked.manager_team_name, None);

    // The slice file round-trips through the silver layer unchanged.
    let reread: Vec<MergedGameweekRow> =
        store::read_table(&config.silver_gameweek_path(1)).unwrap();
    assert_eq!(reread, merged);

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}

#[test]
fn missing_picks_file_leaves_the_week_unpicked() {
    let config = scratch_config("merge-missing-picks");
    store::write_json_value(
        &config.bronze_gameweek_path(2),
        &json!({"elements": {"9": {"stats": {"total_points": 4}}}}),
    )
    .unwrap();
    let league = vec![league_entry(300, "Gamma FC")];

    let merged = merge::transform_gameweek(&config, 2, &[300], &league).unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].stats.player_id, 9);
    assert_eq!(merged[0].manager_id, None);

    std::fs::remove_dir_all(&config.data_dir).unwrap();
}
