use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use slackbot_core::{AppCore, BotConfig, Commands, Message};
use slackbot_storage::Storage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::terminal::TerminalClient;

/// Run the bot against the terminal until stdin closes or Ctrl-C.
pub async fn run(config: &BotConfig, storage: Storage, user: &str, channel: &str) -> Result<()> {
    let client = Arc::new(TerminalClient::new());
    let app = AppCore::new(config, storage, client, |_| Commands::new());

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            ctrl_c.cancel();
        }
    });

    spawn_stdin_reader(app.inbound(), user.to_string(), channel.to_string());

    info!("Reading messages from stdin as {} in {}", user, channel);
    app.start(shutdown).await;
    Ok(())
}

/// Forward stdin lines on a plain thread; a pending blocking read must not
/// hold up runtime shutdown.
fn spawn_stdin_reader(inbound: mpsc::Sender<Message>, user: String, channel: String) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if inbound
                .blocking_send(Message::new(&user, &channel, line))
                .is_err()
            {
                debug!("Bot stopped, no longer reading stdin");
                break;
            }
        }
        debug!("Stdin closed");
    });
}
