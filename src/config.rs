use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::event::MAX_EVENTS;

pub const CONFIG_FILENAME: &str = "machinestate.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Directory holding one `YYYY-MM-DD.json` partition per day.
    pub data_dir: PathBuf,
    /// Live cache capacity across all machines.
    pub max_events: usize,
    /// Expose `GET /debug/{machine_id}/{state}`. Unauthenticated write path.
    pub debug_routes: bool,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
            data_dir: PathBuf::from("data"),
            max_events: MAX_EVENTS,
            debug_routes: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load from `path`, or from [`CONFIG_FILENAME`] when it exists. With
    /// neither, the defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => load_config_from_path(path),
            None if Path::new(CONFIG_FILENAME).exists() => load_config_from_path(CONFIG_FILENAME),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}
