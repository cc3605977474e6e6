use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use draft_etl::config::Config;
use draft_etl::fetch::ApiClient;
use draft_etl::publish::Publisher;
use draft_etl::slices::RunMode;
use draft_etl::{bronze, gold, gold_dimensions, gold_facts, merge, silver, slices, store};

struct RunOptions {
    incremental: bool,
    gold_only: bool,
    skip_upload: bool,
    window: Option<u32>,
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let options = parse_args();
    let mut config = Config::from_env();
    if let Some(data_dir) = &options.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(window) = options.window {
        config.incremental_window = window;
    }
    config.ensure_directories()?;

    if options.gold_only {
        info!("gold-only run: skipping extraction and cleaning");
    } else {
        run_extract_and_clean(&config, options.incremental)?;
    }

    run_gold(&config, options.incremental)?;

    if options.skip_upload {
        info!("upload skipped (--skip-upload)");
    } else {
        match Publisher::from_config(&config) {
            Ok(publisher) => publisher.upload_all(&config)?,
            Err(err) => warn!("upload skipped: {err}"),
        }
    }

    info!("pipeline run complete");
    Ok(())
}

/// Bronze capture plus bronze-to-silver cleaning for the selected slices.
fn run_extract_and_clean(config: &Config, incremental: bool) -> Result<()> {
    let client = ApiClient::new(config)?;

    let league = bronze::extract_league_raw(config, &client)?;
    let manager_ids = bronze::manager_ids_from_league(&league)?;
    bronze::extract_players_raw(config, &client)?;
    bronze::extract_fixtures_raw(config)?;

    let current = bronze::current_gameweek(config, &client)?;
    let captured = store::captured_gameweeks(&config.bronze_gameweeks_dir())?;
    let mode = if incremental {
        RunMode::Incremental
    } else {
        RunMode::Full
    };
    let selected = slices::select_slices(mode, current, &captured);
    info!("selected gameweek slices: {selected:?}");
    bronze::extract_slices(config, &client, &selected, &manager_ids)?;

    let league_rows = silver::transform_league_standings(config)?;
    silver::transform_players_data(config)?;
    silver::transform_fixtures(config)?;
    for &gameweek in &selected {
        merge::transform_gameweek(config, gameweek, &manager_ids, &league_rows)?;
    }
    Ok(())
}

/// The gold layer rebuilds from whatever silver files exist: the classic
/// aggregate tables first, then the dimensional model.
fn run_gold(config: &Config, incremental: bool) -> Result<()> {
    gold::create_full_gameweek_dataset(config)?;
    gold::create_player_season_stats(config)?;
    gold::create_manager_performance(config)?;

    let dims = gold_dimensions::create_all_dimensions(config)?;
    gold_facts::create_all_facts(config, &dims, incremental, config.incremental_window)?;
    Ok(())
}

fn parse_args() -> RunOptions {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut options = RunOptions {
        incremental: false,
        gold_only: false,
        skip_upload: false,
        window: None,
        data_dir: None,
    };
    for (idx, arg) in args.iter().enumerate() {
        match arg.as_str() {
            "--incremental" => options.incremental = true,
            "--gold-only" => options.gold_only = true,
            "--skip-upload" => options.skip_upload = true,
            "--window" => {
                if let Some(next) = args.get(idx + 1) {
                    options.window = next.trim().parse().ok();
                }
            }
            "--data-dir" => {
                if let Some(next) = args.get(idx + 1)
                    && !next.trim().is_empty()
                {
                    options.data_dir = Some(PathBuf::from(next));
                }
            }
            other => {
                if let Some(raw) = other.strip_prefix("--window=") {
                    options.window = raw.trim().parse().ok();
                }
                if let Some(raw) = other.strip_prefix("--data-dir=") {
                    let trimmed = raw.trim();
                    if !trimmed.is_empty() {
                        options.data_dir = Some(PathBuf::from(trimmed));
                    }
                }
            }
        }
    }
    options
}
