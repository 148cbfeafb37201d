//! Message dispatch.
//!
//! Every inbound message runs in its own task:
//!
//! ```text
//! clean text → authorize → per-user lock → Commands::run → fallback
//!              (user messages only)
//! ```
//!
//! Internal messages (continuations, help suggestions) re-enter through the
//! [`Dispatcher`] and skip authorization and the per-user lock: they were
//! already accepted under the original message.

mod auth;
mod dispatcher;
mod fallback;
mod user_lock;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChatClient, Message};
use crate::command::Commands;

pub use auth::Authorizer;
pub use dispatcher::Dispatcher;
pub use fallback::{FallbackResolver, edit_distance};
pub use user_lock::{UserGuard, UserLocks};

/// Normalize message text before matching.
///
/// Trims, strips a leading `<@USER>` mention and replaces typographic quotes.
/// Returns `None` when nothing is left.
pub fn clean_text(text: &str) -> Option<String> {
    let mut text = text.trim();
    if text.starts_with("<@")
        && let Some(end) = text.find('>')
    {
        text = text[end + 1..].trim_start();
    }

    let text: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            c => c,
        })
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub struct Bot {
    commands: Commands,
    client: Arc<dyn ChatClient>,
    fallback: FallbackResolver,
    authorizer: Authorizer,
    locks: UserLocks,
    dispatcher: Dispatcher,
    drain_timeout: Duration,
}

impl Bot {
    /// Build a bot over fully registered commands.
    pub fn new(
        commands: Commands,
        client: Arc<dyn ChatClient>,
        dispatcher: Dispatcher,
        authorizer: Authorizer,
    ) -> Self {
        let fallback = FallbackResolver::new(client.clone(), dispatcher.clone(), &commands.help());
        Self {
            commands,
            client,
            fallback,
            authorizer,
            locks: UserLocks::new(),
            dispatcher,
            drain_timeout: Duration::from_secs(5),
        }
    }

    /// How long shutdown waits for in-flight tasks
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process one message to completion.
    pub async fn process_message(&self, message: Message) {
        let Some(text) = clean_text(&message.text) else {
            debug!("Ignoring empty message from {}", message.user);
            return;
        };
        let message = Message { text, ..message };

        if message.internal {
            self.dispatch(&message).await;
            return;
        }

        if !self.authorizer.is_allowed(&message.user) {
            info!("Rejected message from unauthorized user {}", message.user);
            let text = format!(
                "Sorry <@{}>, you are not allowed to use this bot. Please ask an admin.",
                message.user
            );
            if let Err(e) = self.client.reply_error(&message, &text).await {
                warn!("Failed to send rejection: {}", e);
            }
            return;
        }

        let _guard = self.locks.acquire(&message.user).await;
        self.dispatch(&message).await;
    }

    async fn dispatch(&self, message: &Message) {
        debug!(
            "Dispatching '{}' from {} in {} (internal: {})",
            message.text, message.user, message.channel, message.internal
        );
        if self.commands.run(message).await {
            return;
        }
        if let Err(e) = self.fallback.handle_unmatched(message).await {
            error!("Failed to answer unmatched message: {}", e);
        }
    }

    fn spawn_message(self: &Arc<Self>, message: Message) {
        let bot = self.clone();
        self.dispatcher.spawn(async move {
            bot.process_message(message).await;
        });
    }

    /// Run the dispatch loop.
    ///
    /// Ends when `inbound` closes or `shutdown` fires, then keeps serving
    /// internal messages until all tracked tasks finished or the drain
    /// timeout elapsed. Returns the inbound messages that were buffered but
    /// never dispatched.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<Message>,
        mut internal: mpsc::UnboundedReceiver<Message>,
        shutdown: CancellationToken,
    ) -> Vec<Message> {
        info!("Bot started with {} commands", self.commands.count());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                Some(message) = internal.recv() => self.spawn_message(message),
                message = inbound.recv() => match message {
                    Some(message) => self.spawn_message(message),
                    None => {
                        info!("Inbound stream closed");
                        break;
                    }
                },
            }
        }

        // Refuse new inbound messages; blocked senders fail right away.
        inbound.close();
        self.drain(&mut internal).await;

        let mut unprocessed = Vec::new();
        while let Ok(message) = inbound.try_recv() {
            unprocessed.push(message);
        }
        if !unprocessed.is_empty() {
            warn!("{} inbound messages were not processed", unprocessed.len());
        }
        info!("Bot stopped");
        unprocessed
    }

    async fn drain(self: &Arc<Self>, internal: &mut mpsc::UnboundedReceiver<Message>) {
        let tracker = self.dispatcher.tracker().clone();
        tracker.close();

        let deadline = tokio::time::sleep(self.drain_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                Some(message) = internal.recv() => self.spawn_message(message),
                _ = tracker.wait() => break,
                _ = &mut deadline => {
                    warn!("Abandoning {} unfinished tasks", tracker.len());
                    break;
                }
            }
        }
    }
}
