//! Test utilities: a recording chat client and polling helpers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, sleep};

use crate::channel::{ChatClient, Message, OutboundMessage};

/// Chat client that records everything the bot sends.
#[derive(Default)]
pub struct RecordingClient {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    reactions: Arc<Mutex<HashMap<String, Vec<String>>>>,
    user_names: HashMap<String, String>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display name returned by `user_name`
    pub fn with_user_name(mut self, user_id: &str, name: &str) -> Self {
        self.user_names
            .insert(user_id.to_string(), name.to_string());
        self
    }

    /// Get all sent messages
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the content of all sent messages
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    /// Clear sent messages
    pub async fn clear_sent_messages(&self) {
        self.sent.lock().await.clear();
    }

    /// Reactions currently on `message`
    pub async fn reactions_of(&self, message: &Message) -> Vec<String> {
        self.reactions
            .lock()
            .await
            .get(&reaction_key(message))
            .cloned()
            .unwrap_or_default()
    }
}

fn reaction_key(message: &Message) -> String {
    format!("{}:{}", message.channel, message.timestamp)
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn add_reaction(&self, reaction: &str, message: &Message) -> Result<()> {
        let mut reactions = self.reactions.lock().await;
        let entry = reactions.entry(reaction_key(message)).or_default();
        if !entry.iter().any(|r| r == reaction) {
            entry.push(reaction.to_string());
        }
        Ok(())
    }

    async fn remove_reaction(&self, reaction: &str, message: &Message) -> Result<()> {
        if let Some(entry) = self.reactions.lock().await.get_mut(&reaction_key(message)) {
            entry.retain(|r| r != reaction);
        }
        Ok(())
    }

    async fn reactions(&self, message: &Message) -> Result<Vec<String>> {
        Ok(self.reactions_of(message).await)
    }

    async fn user_name(&self, user_id: &str) -> Result<String> {
        Ok(self
            .user_names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string()))
    }
}

/// Poll `condition` every 10ms until it holds or `limit` elapses.
///
/// Returns whether the condition eventually held.
pub async fn wait_until<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// A user message with a fixed timestamp.
pub fn message_at(user: &str, channel: &str, timestamp: &str, text: &str) -> Message {
    Message::new(user, channel, text).with_timestamp(timestamp)
}
