use anyhow::Result;

use crate::cli::ServeArgs;
use crate::config::Config;
use crate::native::{init_tracing, serve};

pub async fn execute_serve(args: ServeArgs) -> Result<()> {
    let config = args.apply(Config::load(args.config.as_deref())?);
    init_tracing(config.log_format);
    serve(&config).await
}
