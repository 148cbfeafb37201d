use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use slackbot_core::config::StorageBackendKind;

pub const DEFAULT_USER: &str = "U_LOCAL";
pub const DEFAULT_CHANNEL: &str = "C_LOCAL";

/// Storage backend override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageArg {
    Memory,
    File,
    Redb,
}

impl From<StorageArg> for StorageBackendKind {
    fn from(value: StorageArg) -> Self {
        match value {
            StorageArg::Memory => StorageBackendKind::Memory,
            StorageArg::File => StorageBackendKind::File,
            StorageArg::Redb => StorageBackendKind::Redb,
        }
    }
}

#[derive(Parser)]
#[command(name = "slackbot")]
#[command(version, about = "slackbot - chat command bot with queued follow-up commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ~/.config/slackbot/config.toml)
    #[arg(long, global = true, env = "SLACKBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file or storage directory (overrides storage.path)
    #[arg(long, global = true, env = "SLACKBOT_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Storage backend (overrides storage.backend)
    #[arg(long, global = true, value_enum)]
    pub storage: Option<StorageArg>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talk to the bot from the terminal (default)
    Run {
        /// User ID the typed messages are sent as
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,

        /// Channel ID the typed messages are sent to
        #[arg(long, default_value = DEFAULT_CHANNEL)]
        channel: String,
    },

    /// Inspect the persisted pending queue
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List persisted pending commands, oldest first
    List,

    /// Remove all persisted pending commands
    Clear,
}
