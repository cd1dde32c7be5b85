use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::InitArgs;
use crate::config::{Config, CONFIG_FILENAME};

pub fn execute_init(args: InitArgs) -> Result<()> {
    if Path::new(CONFIG_FILENAME).exists() && !args.force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            CONFIG_FILENAME
        );
    }

    let config = Config::default();
    config.save(CONFIG_FILENAME)?;

    eprintln!("Created {}", CONFIG_FILENAME);
    eprintln!("  listen: {}", config.listen);
    eprintln!("  data_dir: {}", config.data_dir.display());
    eprintln!("  max_events: {}", config.max_events);
    eprintln!();
    eprintln!("Next: machinestate serve");

    Ok(())
}
