//! Message types shared by the dispatch pipeline and chat clients.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Reaction shown while a queued command waits for a running one.
pub const REACTION_WAITING: &str = "coffee";
/// Reaction shown once a queued command was handed over for execution.
pub const REACTION_DONE: &str = "white_check_mark";
/// Reaction for messages no command understood.
pub const REACTION_CONFUSED: &str = "question";

/// A normalized inbound message.
///
/// Immutable once dispatched; derive variations with [`Message::with_text`].
/// This is also the persisted value of a pending queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Acting user ID
    pub user: String,
    /// Channel (or direct conversation) ID
    pub channel: String,
    /// Thread timestamp when the message was posted in a thread
    #[serde(default)]
    pub thread: Option<String>,
    /// Chat timestamp, `"<secs>.<micros>"`
    pub timestamp: String,
    /// Message text
    pub text: String,
    /// Set for continuations re-injected by the bot itself
    #[serde(default)]
    pub internal: bool,
}

impl Message {
    /// Create a new user message stamped with the current time.
    pub fn new(
        user: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
            thread: None,
            timestamp: format_timestamp(Utc::now()),
            text: text.into(),
            internal: false,
        }
    }

    /// Set the thread timestamp
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    /// Set the message timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Derive a message with the same identity but different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    /// Mark the message as re-injected by the bot.
    pub fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Deterministic identity of the conversation context (user, channel, thread).
    ///
    /// Dots are removed so the key is safe to embed in storage keys.
    pub fn unique_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.user,
            self.channel,
            self.thread.as_deref().unwrap_or_default()
        )
        .replace('.', "")
    }

    /// When the message was sent, parsed from [`Message::timestamp`].
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Format a time as a chat timestamp (`"<secs>.<micros>"`).
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    format!("{}.{:06}", time.timestamp(), time.timestamp_subsec_micros())
}

/// Parse a chat timestamp; the fractional part is optional.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = match timestamp.split_once('.') {
        Some((secs, fraction)) => (secs, fraction),
        None => (timestamp, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(6).collect();
        digits.parse().ok()?
    };
    Utc.timestamp_opt(secs, micros * 1_000).single()
}

/// Message level for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl MessageLevel {
    /// Get emoji representation for the message level
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Success => "✅",
            Self::Warning => "⚠️",
            Self::Error => "❌",
        }
    }
}

/// Outbound message to a chat channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel
    pub channel: String,
    /// Thread to answer in, if any
    pub thread: Option<String>,
    /// Message content (plain text or markdown)
    pub content: String,
    /// Message level for formatting
    pub level: MessageLevel,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(channel: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread: None,
            content: content.into(),
            level: MessageLevel::Info,
        }
    }

    /// Answer in the same channel and thread as `message`.
    pub fn reply_to(message: &Message, content: impl Into<String>) -> Self {
        Self {
            channel: message.channel.clone(),
            thread: message.thread.clone(),
            content: content.into(),
            level: MessageLevel::Info,
        }
    }

    /// Set message level
    pub fn with_level(mut self, level: MessageLevel) -> Self {
        self.level = level;
        self
    }

    /// Create an error reply
    pub fn error(message: &Message, content: impl Into<String>) -> Self {
        Self::reply_to(message, content).with_level(MessageLevel::Error)
    }

    /// Create a warning reply
    pub fn warning(message: &Message, content: impl Into<String>) -> Self {
        Self::reply_to(message, content).with_level(MessageLevel::Warning)
    }

    /// Format the message with emoji prefix based on level
    pub fn formatted_content(&self) -> String {
        match self.level {
            MessageLevel::Info => self.content.clone(),
            level => format!("{} {}", level.emoji(), self.content),
        }
    }
}
