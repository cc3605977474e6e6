//! File IO for the three layers. Tables persist as JSON arrays of typed
//! rows; every write goes through a tmp-then-rename swap so a crashed run
//! never leaves a half-written artifact behind.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn write_json_value(path: &Path, value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize raw payload")?;
    write_atomic(path, json.as_bytes())
}

pub fn read_json_value(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read raw file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid json in {}", path.display()))
}

/// Read a raw payload, treating a missing or unreadable file as "no data for
/// this slice" rather than an error.
pub fn read_json_value_opt(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)
        .with_context(|| format!("serialize table {}", path.display()))?;
    write_atomic(path, json.as_bytes())
}

pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read table {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("decode table {}", path.display()))
}

/// Read a table that may not have been built yet.
pub fn read_table_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    if !path.exists() {
        return Ok(None);
    }
    read_table(path).map(Some)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

/// Gameweek numbers already captured in the bronze layer, from the
/// `gw_{n}_raw.json` naming convention. A missing directory means nothing
/// has been captured yet.
pub fn captured_gameweeks(bronze_gameweeks_dir: &Path) -> Result<BTreeSet<u32>> {
    let mut out = BTreeSet::new();
    let entries = match fs::read_dir(bronze_gameweeks_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("list {}", bronze_gameweeks_dir.display()));
        }
    };
    for entry in entries {
        let entry = entry.context("read bronze gameweek dir entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(gw) = parse_bronze_gameweek_name(name) {
            out.insert(gw);
        }
    }
    Ok(out)
}

/// Silver per-gameweek files in ascending gameweek order.
pub fn silver_gameweek_files(silver_gameweeks_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut out = Vec::new();
    let entries = match fs::read_dir(silver_gameweeks_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("list {}", silver_gameweeks_dir.display()));
        }
    };
    for entry in entries {
        let entry = entry.context("read silver gameweek dir entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(gw) = parse_silver_gameweek_name(name) {
            out.push((gw, entry.path()));
        }
    }
    out.sort_by_key(|(gw, _)| *gw);
    Ok(out)
}

fn parse_bronze_gameweek_name(name: &str) -> Option<u32> {
    name.strip_prefix("gw_")?
        .strip_suffix("_raw.json")?
        .parse()
        .ok()
}

fn parse_silver_gameweek_name(name: &str) -> Option<u32> {
    name.strip_prefix("gw_data_gw")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_bronze_gameweek_name, parse_silver_gameweek_name};

    #[test]
    fn parses_layer_file_names() {
        assert_eq!(parse_bronze_gameweek_name("gw_12_raw.json"), Some(12));
        assert_eq!(parse_bronze_gameweek_name("gw_12_raw.json.tmp"), None);
        assert_eq!(parse_bronze_gameweek_name("league_standings_raw.json"), None);
        assert_eq!(parse_silver_gameweek_name("gw_data_gw3.json"), Some(3));
        assert_eq!(parse_silver_gameweek_name("gw_data_gwX.json"), None);
    }
}
