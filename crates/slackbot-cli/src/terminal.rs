//! Terminal chat client: replies and reaction changes are printed to stdout.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use parking_lot::Mutex;
use slackbot_core::{ChatClient, Message, MessageLevel, OutboundMessage};

const BOT_PROMPT: &str = "bot>";

#[derive(Default)]
pub struct TerminalClient {
    /// Reactions per message, keyed by channel and timestamp
    reactions: Mutex<HashMap<String, Vec<String>>>,
}

impl TerminalClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn reaction_key(message: &Message) -> String {
        format!("{}/{}", message.channel, message.timestamp)
    }
}

/// One printed line (or block) for an outbound message.
pub fn render_outbound(message: &OutboundMessage) -> String {
    let content = message.formatted_content();
    let content = match message.level {
        MessageLevel::Info => content.normal(),
        MessageLevel::Success => content.green(),
        MessageLevel::Warning => content.yellow(),
        MessageLevel::Error => content.red(),
    };
    match &message.thread {
        Some(thread) => format!(
            "{} {} {}",
            BOT_PROMPT.cyan().bold(),
            format!("[{}]", thread).dimmed(),
            content
        ),
        None => format!("{} {}", BOT_PROMPT.cyan().bold(), content),
    }
}

fn render_reaction(sign: char, reaction: &str, message: &Message) -> String {
    format!(
        "{} {}",
        format!("{}:{}:", sign, reaction).dimmed(),
        message.text.dimmed()
    )
}

#[async_trait]
impl ChatClient for TerminalClient {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        println!("{}", render_outbound(&message));
        Ok(())
    }

    async fn add_reaction(&self, reaction: &str, message: &Message) -> Result<()> {
        {
            let mut reactions = self.reactions.lock();
            let current = reactions.entry(Self::reaction_key(message)).or_default();
            if current.iter().any(|r| r == reaction) {
                return Ok(());
            }
            current.push(reaction.to_string());
        }
        println!("{}", render_reaction('+', reaction, message));
        Ok(())
    }

    async fn remove_reaction(&self, reaction: &str, message: &Message) -> Result<()> {
        let removed = {
            let mut reactions = self.reactions.lock();
            let key = Self::reaction_key(message);
            let Some(current) = reactions.get_mut(&key) else {
                return Ok(());
            };
            let before = current.len();
            current.retain(|r| r != reaction);
            let removed = current.len() != before;
            if current.is_empty() {
                reactions.remove(&key);
            }
            removed
        };
        if removed {
            println!("{}", render_reaction('-', reaction, message));
        }
        Ok(())
    }

    async fn reactions(&self, message: &Message) -> Result<Vec<String>> {
        Ok(self
            .reactions
            .lock()
            .get(&Self::reaction_key(message))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reactions_are_tracked_per_message() {
        let client = TerminalClient::new();
        let first = Message::new("U1", "C1", "then reply a").with_timestamp("1.0");
        let second = Message::new("U1", "C1", "then reply b").with_timestamp("2.0");

        client.add_reaction("coffee", &first).await.unwrap();
        client.add_reaction("coffee", &first).await.unwrap();
        client.add_reaction("question", &second).await.unwrap();
        assert_eq!(client.reactions(&first).await.unwrap(), ["coffee"]);

        client.remove_reaction("coffee", &first).await.unwrap();
        client.add_reaction("white_check_mark", &first).await.unwrap();
        assert_eq!(client.reactions(&first).await.unwrap(), ["white_check_mark"]);
        assert_eq!(client.reactions(&second).await.unwrap(), ["question"]);

        client.remove_reaction("coffee", &second).await.unwrap();
        assert_eq!(client.reactions(&second).await.unwrap(), ["question"]);
    }

    #[test]
    fn test_render_outbound() {
        colored::control::set_override(false);
        let message = Message::new("U1", "C1", "reply hi");
        assert_eq!(
            render_outbound(&OutboundMessage::reply_to(&message, "hi")),
            "bot> hi"
        );
        assert_eq!(
            render_outbound(&OutboundMessage::error(&message.with_thread("9.1"), "nope")),
            "bot> [9.1] ❌ nope"
        );
    }
}
