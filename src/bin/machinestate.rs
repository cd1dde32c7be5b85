use clap::Parser;
use machinestate::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => commands::execute_serve(args).await?,
        Commands::History(args) => commands::execute_history(args).await?,
        Commands::Days(args) => commands::execute_days(args).await?,
        Commands::Init(args) => commands::execute_init(args)?,
    }

    Ok(())
}
