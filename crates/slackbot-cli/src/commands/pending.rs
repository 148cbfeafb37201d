use anyhow::Result;
use colored::Colorize;
use slackbot_core::RunningCommands;
use slackbot_core::queue::PENDING_COLLECTION;
use slackbot_storage::Storage;

use crate::cli::PendingCommands;

pub fn run(storage: Storage, command: PendingCommands) -> Result<()> {
    match command {
        PendingCommands::List => list(storage),
        PendingCommands::Clear => clear(storage),
    }
}

fn list(storage: Storage) -> Result<()> {
    let entries = RunningCommands::new(storage).pending_entries()?;
    if entries.is_empty() {
        println!("No pending commands");
        return Ok(());
    }

    println!("{}", format!("{} pending commands", entries.len()).bold());
    for (key, message) in entries {
        println!(
            "{}  {} in {}: {}",
            key.dimmed(),
            message.user,
            message.channel,
            message.text
        );
    }
    Ok(())
}

fn clear(storage: Storage) -> Result<()> {
    let removed = storage.delete_collection(PENDING_COLLECTION)?;
    println!("Removed {} pending commands", removed);
    Ok(())
}
