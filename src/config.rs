use crate::engine::Cadence;
use crate::storage::Storage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Focus time per point and badge, e.g. "2m".
    pub award_interval: String,
    /// Refresh cadence while a session runs, e.g. "1s".
    pub tick_interval: String,
    pub recent_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            award_interval: "2m".to_string(),
            tick_interval: "1s".to_string(),
            recent_sessions: 5,
        }
    }
}

impl Config {
    pub fn cadence(&self) -> Result<Cadence> {
        Ok(Cadence {
            award_interval: parse_interval("award_interval", &self.award_interval)?,
            tick_interval: parse_interval("tick_interval", &self.tick_interval)?,
        })
    }
}

fn parse_interval(field: &str, value: &str) -> Result<chrono::Duration> {
    let parsed = humantime::parse_duration(value)
        .with_context(|| format!("invalid {} '{}'", field, value))?;
    if parsed.is_zero() {
        anyhow::bail!("{} must be greater than zero", field);
    }
    Ok(chrono::Duration::from_std(parsed)?)
}

pub fn load_config() -> Result<Config> {
    let path = Storage::get_base_dir()?.join("config.json");
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        let data = serde_json::to_string_pretty(&config)?;
        fs::write(path, data)?;
        return Ok(config);
    }

    let data = fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)
        .with_context(|| format!("invalid config at {}", path.display()))?;
    Ok(config)
}
