use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::{DaysArgs, HistoryArgs};
use crate::handler::StateService;
use crate::store::{day_key, FileDayStore};

/// Offline read of one stored day. Prints the same document the HTTP day
/// query returns; `server_start` is the time of this invocation.
pub async fn execute_history(args: HistoryArgs) -> Result<()> {
    let service = open(&args.data_dir)?;
    let history = service
        .day_history(&args.machine_id, &args.date)
        .await
        .with_context(|| format!("Failed to read history for {}", args.date))?;

    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}

pub async fn execute_days(args: DaysArgs) -> Result<()> {
    let service = open(&args.data_dir)?;
    let days = service.days().await.context("Failed to list days")?;

    if days.is_empty() {
        eprintln!("No stored days in {}", args.data_dir.display());
    }
    for day in days {
        println!("{}", day_key(day));
    }
    Ok(())
}

fn open(data_dir: &Path) -> Result<StateService<FileDayStore>> {
    let store = FileDayStore::open(data_dir)
        .with_context(|| format!("Failed to open data dir {}", data_dir.display()))?;
    Ok(StateService::new(store))
}
