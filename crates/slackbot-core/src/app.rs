//! Application root: wires storage, client, commands and the dispatch loop.

use std::collections::HashSet;
use std::sync::Arc;

use slackbot_storage::Storage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bot::{Authorizer, Bot, Dispatcher};
use crate::channel::{ChatClient, Message};
use crate::command::{Commands, DelayCommand, HelpCommand, ReplyCommand};
use crate::config::BotConfig;
use crate::queue::{ListQueueCommand, QueueCommand, RunningCommands, pending_key};

/// Collaborators handed to plugin factories.
#[derive(Clone)]
pub struct PluginContext {
    pub client: Arc<dyn ChatClient>,
    pub running: RunningCommands,
    pub dispatcher: Dispatcher,
}

/// Fully wired bot, ready to start.
///
/// Registration order: queue commands, delay, plugins, reply, help.
pub struct AppCore {
    bot: Arc<Bot>,
    running: RunningCommands,
    inbound_tx: mpsc::Sender<Message>,
    inbound_rx: mpsc::Receiver<Message>,
    internal_rx: mpsc::UnboundedReceiver<Message>,
}

impl AppCore {
    /// Build the bot; `plugins` creates extra commands from the shared
    /// collaborators.
    pub fn new<F>(
        config: &BotConfig,
        storage: Storage,
        client: Arc<dyn ChatClient>,
        plugins: F,
    ) -> Self
    where
        F: FnOnce(&PluginContext) -> Commands,
    {
        let running = RunningCommands::new(storage);
        let (dispatcher, internal_rx) = Dispatcher::channel();
        let plugins = plugins(&PluginContext {
            client: client.clone(),
            running: running.clone(),
            dispatcher: dispatcher.clone(),
        });

        let mut commands = Commands::new();
        commands
            .add(QueueCommand::new(
                client.clone(),
                running.clone(),
                dispatcher.clone(),
            ))
            .add(ListQueueCommand::new(client.clone(), running.clone()))
            .add(DelayCommand::new(
                client.clone(),
                running.clone(),
                dispatcher.clone(),
            ))
            .merge(plugins);

        let templates = commands.template_functions();
        commands.add(ReplyCommand::new(client.clone()).with_template_functions(templates));

        let help = HelpCommand::new(client.clone(), commands.help());
        commands.add(help);

        let bot = Bot::new(
            commands,
            client,
            dispatcher,
            Authorizer::new(config.allowed_users.iter().cloned()),
        )
        .with_drain_timeout(config.dispatch.drain_timeout());

        let (inbound_tx, inbound_rx) = mpsc::channel(config.dispatch.inbound_buffer.max(1));
        Self {
            bot: Arc::new(bot),
            running,
            inbound_tx,
            inbound_rx,
            internal_rx,
        }
    }

    /// Sender for inbound messages from the chat transport.
    ///
    /// The loop ends once every sender is dropped.
    pub fn inbound(&self) -> mpsc::Sender<Message> {
        self.inbound_tx.clone()
    }

    pub fn running_commands(&self) -> &RunningCommands {
        &self.running
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.bot.dispatcher()
    }

    /// Replay persisted pending entries, then run until the inbound stream
    /// closes or `shutdown` fires.
    ///
    /// Replayed entries that were still buffered when the loop stopped are
    /// persisted again for the next start.
    pub async fn start(self, shutdown: CancellationToken) {
        let Self {
            bot,
            running,
            inbound_tx,
            inbound_rx,
            internal_rx,
        } = self;

        let entries = running.take_pending().unwrap_or_else(|e| {
            warn!("Failed to load pending commands: {}", e);
            Vec::new()
        });
        let replayed: HashSet<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        if !entries.is_empty() {
            info!("Replaying {} pending commands", entries.len());
        }

        // Replay concurrently so a full inbound buffer cannot stall startup.
        let replay = {
            let running = running.clone();
            tokio::spawn(async move { running.replay(entries, &inbound_tx).await })
        };

        let unprocessed = bot.run(inbound_rx, internal_rx, shutdown).await;

        // The inbound receiver is closed now, so the replay ends promptly and
        // restores whatever it could not send.
        if let Err(e) = replay.await {
            warn!("Pending command replay failed: {}", e);
        }

        let unreplayed: Vec<Message> = unprocessed
            .into_iter()
            .filter(|message| replayed.contains(&pending_key(message)))
            .collect();
        if !unreplayed.is_empty() {
            let restored = running.restore_pending(unreplayed);
            info!("Kept {} unprocessed pending commands for the next start", restored);
        }
    }
}
