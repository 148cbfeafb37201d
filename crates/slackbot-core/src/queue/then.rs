//! `queue <command>` / `then <command>` - run a command once the running
//! command of the same conversation context has finished.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use super::running::RunningCommands;
use crate::bot::Dispatcher;
use crate::channel::{ChatClient, Message, REACTION_DONE, REACTION_WAITING};
use crate::command::{Category, Command, HelpEntry, TemplateFunctions};
use crate::matcher::{MatchResult, Matcher, RegexMatcher, VoidMatcher, action};

pub(super) const NOTHING_RUNNING: &str =
    "You have to call this command when another long running command is already running";

/// Help category of the queue commands.
pub fn queue_category() -> Category {
    Category::new("Queue", "Run commands after each other")
}

pub struct QueueCommand {
    client: Arc<dyn ChatClient>,
    running: RunningCommands,
    dispatcher: Dispatcher,
}

impl QueueCommand {
    pub fn new(
        client: Arc<dyn ChatClient>,
        running: RunningCommands,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            client,
            running,
            dispatcher,
        }
    }

    async fn enqueue(&self, message: Message, result: MatchResult) -> Result<()> {
        let Some(handle) = self.running.get(&message) else {
            debug!("Nothing running for '{}'", message.unique_key());
            return self.client.reply_error(&message, NOTHING_RUNNING).await;
        };

        let command = result.get_str("command").to_string();
        self.client.add_reaction(REACTION_WAITING, &message).await?;
        debug!("Queued '{}' behind '{}'", command, handle.key());

        let client = self.client.clone();
        let dispatcher = self.dispatcher.clone();
        self.dispatcher.spawn(async move {
            handle.wait().await;

            if let Err(e) = client.remove_reaction(REACTION_WAITING, &message).await {
                warn!("Failed to remove waiting reaction: {}", e);
            }
            if let Err(e) = client.add_reaction(REACTION_DONE, &message).await {
                warn!("Failed to add done reaction: {}", e);
            }
            dispatcher.submit_internal_message(message.with_text(command));
        });
        Ok(())
    }
}

impl Command for QueueCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        let run = action(move |message, result| {
            let this = self.clone();
            async move { this.enqueue(message, result).await }
        });
        match RegexMatcher::new(r"(?:queue|then) (?P<command>.+)", run) {
            Ok(matcher) => Box::new(matcher),
            Err(e) => {
                warn!("Invalid queue pattern: {}", e);
                Box::new(VoidMatcher)
            }
        }
    }

    fn help(&self) -> Vec<HelpEntry> {
        vec![
            HelpEntry::new(
                "queue <command>",
                "Run a command after the currently running command in this thread finished",
            )
            .with_examples(["delay 1h reply I'm back", "queue reply done"])
            .with_category(queue_category()),
            HelpEntry::new("then <command>", "Alias of `queue <command>`")
                .with_examples(["then reply done"])
                .with_category(queue_category()),
        ]
    }

    fn template_functions(&self) -> TemplateFunctions {
        self.running.template_functions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Commands;
    use crate::testkit::{RecordingClient, message_at};
    use slackbot_storage::Storage;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        client: Arc<RecordingClient>,
        running: RunningCommands,
        commands: Commands,
        internal: mpsc::UnboundedReceiver<Message>,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(RecordingClient::new());
        let running = RunningCommands::new(Storage::memory());
        let (dispatcher, internal) = Dispatcher::channel();
        let mut commands = Commands::new();
        commands.add(QueueCommand::new(client.clone(), running.clone(), dispatcher));
        Fixture {
            client,
            running,
            commands,
            internal,
        }
    }

    #[tokio::test]
    async fn test_then_waits_for_running_command() {
        let mut f = fixture();
        let blocking = message_at("U1", "C1", "1.0", "deploy");
        let handle = f.running.register(&blocking, "").unwrap();

        let then = message_at("U1", "C1", "2.0", "then reply done");
        assert!(f.commands.run(&then).await);

        assert_eq!(f.client.reactions_of(&then).await, [REACTION_WAITING]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.internal.try_recv().is_err());

        handle.resolve();
        let delivered = tokio::time::timeout(Duration::from_secs(1), f.internal.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.text, "reply done");
        assert!(delivered.internal);
        assert_eq!(delivered.unique_key(), then.unique_key());
        assert_eq!(f.client.reactions_of(&then).await, [REACTION_DONE]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.internal.try_recv().is_err());
        assert!(f.client.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_then_without_running_command_replies_error() {
        let mut f = fixture();
        let then = message_at("U1", "C1", "2.0", "queue reply done");
        assert!(f.commands.run(&then).await);

        let sent = f.client.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, NOTHING_RUNNING);
        assert_eq!(f.running.count_active(), 0);
        assert!(f.client.reactions_of(&then).await.is_empty());
        assert!(f.internal.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_then_only_applies_to_same_context() {
        let mut f = fixture();
        let _handle = f
            .running
            .register(&message_at("U1", "C1", "1.0", "deploy").with_thread("1.0"), "")
            .unwrap();

        f.commands
            .run(&message_at("U1", "C1", "2.0", "then reply done"))
            .await;

        assert_eq!(f.client.sent_texts().await, [NOTHING_RUNNING]);
        assert!(f.internal.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multiple_waiters_each_deliver_once() {
        let mut f = fixture();
        let handle = f
            .running
            .register(&message_at("U1", "C1", "1.0", "deploy"), "")
            .unwrap();

        f.commands
            .run(&message_at("U1", "C1", "2.0", "then reply one"))
            .await;
        f.commands
            .run(&message_at("U1", "C1", "3.0", "queue reply two"))
            .await;
        handle.resolve();

        let mut texts = Vec::new();
        for _ in 0..2 {
            let message = tokio::time::timeout(Duration::from_secs(1), f.internal.recv())
                .await
                .unwrap()
                .unwrap();
            texts.push(message.text);
        }
        texts.sort();
        assert_eq!(texts, ["reply one", "reply two"]);
    }

    #[tokio::test]
    async fn test_does_not_match_bare_keyword() {
        let f = fixture();
        assert!(!f.commands.run(&message_at("U1", "C1", "1.0", "then")).await);
        assert!(!f.commands.run(&message_at("U1", "C1", "1.0", "thence x")).await);
    }
}
