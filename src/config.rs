use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_LEAGUE_ID: &str = "24636";
pub const DEFAULT_BASE_URL: &str = "https://draft.premierleague.com/api";

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Trailing gameweeks re-derived by the incremental fact merge.
pub const DEFAULT_INCREMENTAL_WINDOW: u32 = 2;

/// Run-scoped pipeline configuration: API endpoints, retry policy, the
/// bronze/silver/gold directory layout, and publish credentials. Constructed
/// once in `main` and passed by reference into every stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub league_id: String,
    pub base_url: String,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub incremental_window: u32,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub supabase_bucket: String,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            league_id: DEFAULT_LEAGUE_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            incremental_window: DEFAULT_INCREMENTAL_WINDOW,
            supabase_url: None,
            supabase_key: None,
            supabase_bucket: "data".to_string(),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = env_non_empty("DRAFT_ETL_DATA_DIR").unwrap_or_else(|| "Data".to_string());
        let mut config = Self::new(data_dir);
        if let Some(league_id) = env_non_empty("FPL_LEAGUE_ID") {
            config.league_id = league_id;
        }
        if let Some(base_url) = env_non_empty("FPL_BASE_URL") {
            config.base_url = base_url;
        }
        config.supabase_url = env_non_empty("SUPABASE_URL");
        config.supabase_key = env_non_empty("SUPABASE_SERVICE_KEY");
        config
    }

    // ---- bronze layer ----

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn bronze_league_raw(&self) -> PathBuf {
        self.bronze_dir().join("league_standings_raw.json")
    }

    pub fn bronze_players_raw(&self) -> PathBuf {
        self.bronze_dir().join("players_raw.json")
    }

    pub fn bronze_fixtures_raw(&self) -> PathBuf {
        self.bronze_dir().join("fixtures_raw.json")
    }

    pub fn bronze_gameweeks_dir(&self) -> PathBuf {
        self.bronze_dir().join("gameweeks")
    }

    pub fn bronze_gameweek_path(&self, gameweek: u32) -> PathBuf {
        self.bronze_gameweeks_dir()
            .join(format!("gw_{gameweek}_raw.json"))
    }

    pub fn bronze_picks_dir(&self) -> PathBuf {
        self.bronze_dir().join("manager_picks")
    }

    pub fn bronze_picks_path(&self, gameweek: u32, manager_id: u64) -> PathBuf {
        self.bronze_picks_dir()
            .join(format!("gw_{gameweek}_manager_{manager_id}.json"))
    }

    // ---- silver layer ----

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    pub fn silver_league_path(&self) -> PathBuf {
        self.silver_dir().join("league_standings.json")
    }

    pub fn silver_players_path(&self) -> PathBuf {
        self.silver_dir().join("players_data.json")
    }

    pub fn silver_fixtures_path(&self) -> PathBuf {
        self.silver_dir().join("fixtures.json")
    }

    pub fn silver_gameweeks_dir(&self) -> PathBuf {
        self.silver_dir().join("gameweeks")
    }

    pub fn silver_gameweek_path(&self, gameweek: u32) -> PathBuf {
        self.silver_gameweeks_dir()
            .join(format!("gw_data_gw{gameweek}.json"))
    }

    // ---- gold layer ----

    pub fn gold_dir(&self) -> PathBuf {
        self.data_dir.join("gold")
    }

    pub fn gold_gw_data_full(&self) -> PathBuf {
        self.gold_dir().join("gw_data_full.json")
    }

    pub fn gold_player_season_stats(&self) -> PathBuf {
        self.gold_dir().join("player_season_stats.json")
    }

    pub fn gold_manager_performance(&self) -> PathBuf {
        self.gold_dir().join("manager_performance.json")
    }

    pub fn gold_dimensions_dir(&self) -> PathBuf {
        self.gold_dir().join("dimensions")
    }

    pub fn gold_dimension_path(&self, name: &str) -> PathBuf {
        self.gold_dimensions_dir().join(format!("{name}.json"))
    }

    pub fn gold_facts_dir(&self) -> PathBuf {
        self.gold_dir().join("facts")
    }

    pub fn gold_fact_path(&self, name: &str) -> PathBuf {
        self.gold_facts_dir().join(format!("{name}.json"))
    }

    pub fn timestamp_path(&self) -> PathBuf {
        self.data_dir.join("last_updated.json")
    }

    /// Create every layer directory up front so stage code can assume the
    /// tree exists.
    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = [
            self.data_dir.clone(),
            self.bronze_dir(),
            self.bronze_gameweeks_dir(),
            self.bronze_picks_dir(),
            self.silver_dir(),
            self.silver_gameweeks_dir(),
            self.gold_dir(),
            self.gold_dimensions_dir(),
            self.gold_facts_dir(),
        ];
        for dir in dirs {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

fn env_non_empty(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
