//! Publishing to Supabase Storage over its REST API. Objects are uploaded
//! under layer prefixes mirroring the local tree, with upsert semantics so
//! reruns overwrite in place.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::store;

pub struct Publisher {
    client: Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl Publisher {
    /// Build a publisher from configured credentials. Missing credentials
    /// are an error here rather than a silent no-op; the caller decides
    /// whether publishing is optional for the run.
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(base_url) = config.supabase_url.clone() else {
            bail!("SUPABASE_URL is not set");
        };
        let Some(key) = config.supabase_key.clone() else {
            bail!("SUPABASE_SERVICE_KEY is not set");
        };
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("build upload client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            bucket: config.supabase_bucket.clone(),
        })
    }

    fn object_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object_path
        )
    }

    /// Upload one object, overwriting any existing version.
    pub fn upload_object(&self, object_path: &str, body: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(self.object_url(object_path))
            .bearer_auth(&self.key)
            .header("x-upsert", "true")
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .with_context(|| format!("upload {object_path}"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            bail!("upload {object_path} failed: {status} {detail}");
        }
        Ok(())
    }

    /// Upload one local file under the given object path.
    pub fn upload_file(&self, local: &Path, object_path: &str) -> Result<()> {
        let body =
            std::fs::read(local).with_context(|| format!("read {}", local.display()))?;
        self.upload_object(object_path, body)
    }

    /// Upload every .json file directly inside `dir` under `prefix`.
    /// A missing directory is skipped, not an error; a run without picks
    /// data still publishes the rest.
    fn upload_dir(&self, dir: &Path, prefix: &str) -> Result<usize> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("skipping missing directory {}", dir.display());
                return Ok(0);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read directory {}", dir.display()))
            }
        };
        let mut count = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            self.upload_file(&path, &format!("{prefix}/{name}"))?;
            count += 1;
        }
        Ok(count)
    }

    pub fn upload_bronze(&self, config: &Config) -> Result<()> {
        let mut count = self.upload_dir(&config.bronze_dir(), "bronze")?;
        count += self.upload_dir(&config.bronze_gameweeks_dir(), "bronze/gameweeks")?;
        count += self.upload_dir(&config.bronze_picks_dir(), "bronze/manager_picks")?;
        info!("uploaded {count} bronze objects");
        Ok(())
    }

    pub fn upload_silver(&self, config: &Config) -> Result<()> {
        let mut count = self.upload_dir(&config.silver_dir(), "silver")?;
        count += self.upload_dir(&config.silver_gameweeks_dir(), "silver/gameweeks")?;
        info!("uploaded {count} silver objects");
        Ok(())
    }

    pub fn upload_gold(&self, config: &Config) -> Result<()> {
        let mut count = self.upload_dir(&config.gold_dir(), "gold")?;
        count += self.upload_dir(&config.gold_dimensions_dir(), "gold/dimensions")?;
        count += self.upload_dir(&config.gold_facts_dir(), "gold/facts")?;
        info!("uploaded {count} gold objects");
        Ok(())
    }

    /// Write the freshness marker locally and upload it. Consumers poll this
    /// one small object instead of listing the bucket.
    pub fn update_timestamp(&self, config: &Config, layer: &str) -> Result<()> {
        let marker = json!({
            "last_updated": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "layer": layer,
        });
        store::write_json_value(&config.timestamp_path(), &marker)?;
        self.upload_file(&config.timestamp_path(), "last_updated.json")?;
        info!("updated freshness marker for {layer}");
        Ok(())
    }

    /// Publish every layer plus the freshness marker.
    pub fn upload_all(&self, config: &Config) -> Result<()> {
        self.upload_bronze(config)?;
        self.upload_silver(config)?;
        self.upload_gold(config)?;
        self.update_timestamp(config, "all")
    }
}
