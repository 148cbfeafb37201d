use anyhow::{Context, Result};
use slackbot_core::BotConfig;
use slackbot_core::config::{LoggingConfig, StorageBackendKind};
use slackbot_storage::Storage;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const LOG_FILE: &str = "slackbot.log";

/// Load the config file and apply command line overrides.
pub fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = match &cli.config {
        Some(path) => BotConfig::load_from_path(path)?,
        None => BotConfig::load()?,
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut BotConfig, cli: &Cli) {
    if let Some(storage) = cli.storage {
        let backend = StorageBackendKind::from(storage);
        // A configured path belongs to the configured backend.
        if backend != config.storage.backend {
            config.storage.path = None;
        }
        config.storage.backend = backend;
    }
    if let Some(path) = &cli.db_path {
        config.storage.path = Some(path.clone());
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr unless a log directory is configured; stdout is the chat.
/// `RUST_LOG` wins over the configured level. Keep the guard alive until exit.
pub fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (writer, guard) = match &logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();
    Ok(guard)
}

/// Open the configured storage backend.
pub fn open_storage(config: &BotConfig) -> Result<Storage> {
    let kind = config.storage.backend_kind()?;
    info!("Opening storage {:?}", kind);
    Storage::open(&kind).with_context(|| format!("Failed to open storage {:?}", kind))
}
