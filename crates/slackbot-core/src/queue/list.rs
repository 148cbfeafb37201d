//! `list queue` / `list queue in channel` - show pending queue entries.

use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use tracing::warn;

use super::running::RunningCommands;
use super::then::queue_category;
use crate::channel::{ChatClient, Message};
use crate::command::{Command, HelpEntry};
use crate::matcher::{GroupMatcher, Matcher, TextMatcher, action};

/// Entries older than this are flagged as stale.
const STALE_AFTER_HOURS: i64 = 24;

pub struct ListQueueCommand {
    client: Arc<dyn ChatClient>,
    running: RunningCommands,
}

impl ListQueueCommand {
    pub fn new(client: Arc<dyn ChatClient>, running: RunningCommands) -> Self {
        Self { client, running }
    }

    async fn list(&self, message: Message, in_channel: bool) -> Result<()> {
        let entries: Vec<Message> = self
            .running
            .pending_entries()?
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| !in_channel || entry.channel == message.channel)
            .collect();

        let mut text = format!("*{} queued commands*", entries.len());
        for entry in &entries {
            text.push('\n');
            text.push_str(&self.render_entry(entry).await);
        }
        self.client.reply(&message, &text).await
    }

    async fn render_entry(&self, entry: &Message) -> String {
        let user = match self.client.user_name(&entry.user).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to resolve user {}: {}", entry.user, e);
                entry.user.clone()
            }
        };
        let reactions = match self.client.reactions(entry).await {
            Ok(reactions) => reactions,
            Err(e) => {
                warn!("Failed to load reactions: {}", e);
                Vec::new()
            }
        };

        let elapsed = entry
            .sent_at()
            .map(|sent_at| Utc::now().signed_duration_since(sent_at))
            .unwrap_or_default();
        let marker = if elapsed > TimeDelta::hours(STALE_AFTER_HOURS) {
            "🔴"
        } else {
            "🟢"
        };

        let mut line = format!(
            "{} *{}* ({} ago): `{}`",
            marker,
            user,
            format_elapsed(elapsed),
            entry.text
        );
        for reaction in reactions {
            line.push_str(&format!(" :{}:", reaction));
        }
        line
    }
}

/// Short human form of a duration, e.g. `2h 5m`.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, secs % 86_400 / 3_600, secs % 3_600 / 60);
    match (days, hours, minutes) {
        (0, 0, 0) => format!("{}s", secs),
        (0, 0, m) => format!("{}m", m),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

impl Command for ListQueueCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        let all = self.clone();
        let in_channel = self;
        Box::new(
            GroupMatcher::new()
                .with(TextMatcher::new(
                    "list queue",
                    action(move |message, _| {
                        let this = all.clone();
                        async move { this.list(message, false).await }
                    }),
                ))
                .with(TextMatcher::new(
                    "list queue in channel",
                    action(move |message, _| {
                        let this = in_channel.clone();
                        async move { this.list(message, true).await }
                    }),
                )),
        )
    }

    fn help(&self) -> Vec<HelpEntry> {
        vec![
            HelpEntry::new("list queue", "List all queued commands")
                .with_examples(["list queue", "list queue in channel"])
                .with_category(queue_category()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{REACTION_WAITING, format_timestamp};
    use crate::command::Commands;
    use crate::testkit::{RecordingClient, message_at};
    use slackbot_storage::Storage;

    fn fixture() -> (Arc<RecordingClient>, RunningCommands, Commands) {
        let client = Arc::new(RecordingClient::new().with_user_name("U1", "alice"));
        let running = RunningCommands::new(Storage::memory());
        let mut commands = Commands::new();
        commands.add(ListQueueCommand::new(client.clone(), running.clone()));
        (client, running, commands)
    }

    fn ago(hours: i64) -> String {
        format_timestamp(Utc::now() - TimeDelta::hours(hours))
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(TimeDelta::seconds(12)), "12s");
        assert_eq!(format_elapsed(TimeDelta::seconds(300)), "5m");
        assert_eq!(format_elapsed(TimeDelta::minutes(125)), "2h 5m");
        assert_eq!(format_elapsed(TimeDelta::hours(50)), "2d 2h");
        assert_eq!(format_elapsed(TimeDelta::seconds(-5)), "0s");
    }

    #[tokio::test]
    async fn test_list_filters_by_channel() {
        let (client, running, commands) = fixture();
        let _a = running
            .register(&message_at("U1", "C1", &ago(1), "deploy"), "reply a")
            .unwrap();
        let _b = running
            .register(&message_at("U2", "C2", &ago(2), "deploy"), "reply b")
            .unwrap();

        commands
            .run(&message_at("U1", "C1", &ago(0), "list queue in channel"))
            .await;
        commands
            .run(&message_at("U1", "C1", &ago(0), "list queue"))
            .await;

        let sent = client.sent_texts().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("*1 queued commands*"));
        assert!(sent[0].contains("`reply a`"));
        assert!(!sent[0].contains("`reply b`"));
        assert!(sent[1].starts_with("*2 queued commands*"));
    }

    #[tokio::test]
    async fn test_list_renders_entries_oldest_first() {
        let (client, running, commands) = fixture();
        let fresh = message_at("U1", "C1", &ago(1), "deploy");
        client.add_reaction(REACTION_WAITING, &fresh).await.unwrap();
        let _fresh = running.register(&fresh, "reply fresh").unwrap();
        let _stale = running
            .register(&message_at("U2", "C1", &ago(30), "deploy"), "reply stale")
            .unwrap();

        commands
            .run(&message_at("U1", "C1", &ago(0), "list queue"))
            .await;

        let sent = client.sent_texts().await;
        let lines: Vec<&str> = sent[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("🔴 *U2* (1d 6h ago): `reply stale`"));
        assert!(lines[2].starts_with("🟢 *alice* (1h 0m ago): `reply fresh`"));
        assert!(lines[2].ends_with(":coffee:"));
    }

    #[tokio::test]
    async fn test_list_empty_queue() {
        let (client, _running, commands) = fixture();
        commands
            .run(&message_at("U1", "C1", &ago(0), "List Queue"))
            .await;
        assert_eq!(client.sent_texts().await, ["*0 queued commands*"]);
    }
}
