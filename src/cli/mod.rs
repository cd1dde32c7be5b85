pub mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{Config, LogFormat};

#[derive(Parser)]
#[command(name = "machinestate")]
#[command(about = "Collect machine state reports and serve live and daily history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP ingestion and query server
    Serve(ServeArgs),
    /// Print the stored history of one machine for one day
    History(HistoryArgs),
    /// List days that have stored events
    Days(DaysArgs),
    /// Write a default config file
    Init(InitArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Config file (defaults to ./machinestate.toml when present)
    #[arg(long, env = "MACHINESTATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5000
    #[arg(long, env = "MACHINESTATE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Directory for day partitions
    #[arg(long, env = "MACHINESTATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Live cache capacity across all machines
    #[arg(long, env = "MACHINESTATE_MAX_EVENTS")]
    pub max_events: Option<usize>,

    /// Mount GET /debug/{machine_id}/{state} (unauthenticated writes)
    #[arg(long)]
    pub debug_routes: bool,

    /// Log output format
    #[arg(long, value_enum, env = "MACHINESTATE_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl ServeArgs {
    /// Apply flags over a loaded config. Flags win.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(ref data_dir) = self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(max_events) = self.max_events {
            config.max_events = max_events;
        }
        if self.debug_routes {
            config.debug_routes = true;
        }
        if let Some(log_format) = self.log_format {
            config.log_format = log_format;
        }
        config
    }
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    /// Machine id
    pub machine_id: String,

    /// Day in YYYY-MM-DD
    pub date: String,

    /// Directory for day partitions
    #[arg(long, env = "MACHINESTATE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}

#[derive(clap::Args)]
pub struct DaysArgs {
    /// Directory for day partitions
    #[arg(long, env = "MACHINESTATE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
