//! `delay <n>[s|m|h|d] <command>` - run a command later.
//!
//! The delay is a running command of its conversation context, so
//! `then <command>` can chain behind it. The delayed command is persisted as
//! the fallback and replayed when the bot restarts before it fired.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::{Command, HelpEntry};
use crate::bot::Dispatcher;
use crate::channel::{ChatClient, Message};
use crate::matcher::{MatchResult, Matcher, RegexMatcher, VoidMatcher, action};
use crate::queue::{RunningCommands, queue_category};

/// Parse `30s`, `5m`, `2h`, `1d`; a bare number means minutes.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    let (number, unit) = match input.char_indices().last()? {
        (index, unit @ ('s' | 'm' | 'h' | 'd')) => (&input[..index], unit),
        _ => (input.as_str(), 'm'),
    };

    let number: u64 = number.parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        _ => 86_400,
    };
    number.checked_mul(multiplier).map(Duration::from_secs)
}

pub struct DelayCommand {
    client: Arc<dyn ChatClient>,
    running: RunningCommands,
    dispatcher: Dispatcher,
}

impl DelayCommand {
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

    async fn delay(&self, message: Message, result: MatchResult) -> Result<()> {
        let Some(delay) = parse_duration(result.get_str("delay")) else {
            return self
                .client
                .reply_error(&message, "Invalid delay, use e.g. `30s`, `5m`, `2h` or `1d`")
                .await;
        };
        let command = result.get_str("command").to_string();

        let handle = match self.running.register(&message, &command) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("Delay rejected: {}", e);
                return self
                    .client
                    .reply_error(&message, "There is already a running command in this thread")
                    .await;
            }
        };

        self.client
            .reply(
                &message,
                &format!("I queued the command `{}` for {:?}", command, delay),
            )
            .await?;

        let dispatcher = self.dispatcher.clone();
        self.dispatcher.spawn(async move {
            tokio::time::sleep(delay).await;
            handle.resolve();
            dispatcher.submit_internal_message(message.with_text(command));
        });
        Ok(())
    }
}

impl Command for DelayCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        let run = action(move |message, result| {
            let this = self.clone();
            async move { this.delay(message, result).await }
        });
        match RegexMatcher::new(r"delay (?P<delay>\d+[smhd]?) (?P<command>.+)", run) {
            Ok(matcher) => Box::new(matcher),
            Err(e) => {
                warn!("Invalid delay pattern: {}", e);
                Box::new(VoidMatcher)
            }
        }
    }

    fn help(&self) -> Vec<HelpEntry> {
        vec![
            HelpEntry::new("delay <duration> <command>", "Run a command after a delay")
                .with_examples(["delay 1h reply I'm back", "delay 30s reply ping"])
                .with_category(queue_category()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Commands;
    use crate::queue::PENDING_COLLECTION;
    use crate::testkit::{RecordingClient, message_at};
    use slackbot_storage::Storage;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2H"), Some(Duration::from_secs(7_200)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("5w"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_registers_then_fires() {
        let client = Arc::new(RecordingClient::new());
        let storage = Storage::memory();
        let running = RunningCommands::new(storage.clone());
        let (dispatcher, mut internal) = Dispatcher::channel();
        let mut commands = Commands::new();
        commands.add(DelayCommand::new(client.clone(), running.clone(), dispatcher));

        let message = message_at("U1", "C1", "1.0", "delay 5m reply hi");
        assert!(commands.run(&message).await);

        assert_eq!(running.count_active(), 1);
        assert_eq!(storage.list_keys(PENDING_COLLECTION).unwrap().len(), 1);
        assert_eq!(
            client.sent_texts().await,
            ["I queued the command `reply hi` for 300s"]
        );

        let fired = internal.recv().await.unwrap();
        assert_eq!(fired.text, "reply hi");
        assert!(fired.internal);
        assert_eq!(running.count_active(), 0);
        assert!(storage.list_keys(PENDING_COLLECTION).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delay_rejected_while_running() {
        let client = Arc::new(RecordingClient::new());
        let running = RunningCommands::new(Storage::memory());
        let (dispatcher, _internal) = Dispatcher::channel();
        let mut commands = Commands::new();
        commands.add(DelayCommand::new(client.clone(), running.clone(), dispatcher));

        let _handle = running
            .register(&message_at("U1", "C1", "1.0", "deploy"), "")
            .unwrap();
        commands
            .run(&message_at("U1", "C1", "2.0", "delay 1m reply hi"))
            .await;

        assert_eq!(
            client.sent_texts().await,
            ["There is already a running command in this thread"]
        );
        assert_eq!(running.count_active(), 1);
    }
}
