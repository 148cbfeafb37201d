mod cli;
mod commands;
mod error;
mod setup;
mod terminal;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CHANNEL, DEFAULT_USER};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = setup::load_config(&cli)?;
    let _guard = setup::init_logging(&config.logging)?;
    let storage = setup::open_storage(&config)?;

    match cli.command {
        None => commands::run::run(&config, storage, DEFAULT_USER, DEFAULT_CHANNEL).await,
        Some(Commands::Run { user, channel }) => {
            commands::run::run(&config, storage, &user, &channel).await
        }
        Some(Commands::Pending { command }) => commands::pending::run(storage, command),
    }
}
