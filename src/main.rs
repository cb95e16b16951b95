mod cli;
mod send;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    upbox::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send(args) => send::run(args, cli.config).await?,
    }

    Ok(())
}
