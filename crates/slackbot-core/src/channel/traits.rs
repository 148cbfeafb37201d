//! Chat Client Trait Definitions
//!
//! The dispatch core talks to the chat platform only through [`ChatClient`].
//! Connection handling, event decoding and rendering live in the
//! implementations.

use anyhow::Result;
use async_trait::async_trait;

use super::types::{Message, OutboundMessage};

/// Outbound capabilities of a chat platform connection.
///
/// # Example
///
/// ```ignore
/// struct MyClient { /* ... */ }
///
/// #[async_trait]
/// impl ChatClient for MyClient {
///     async fn send(&self, message: OutboundMessage) -> Result<()> {
///         // post via API
///         Ok(())
///     }
///
///     async fn add_reaction(&self, reaction: &str, message: &Message) -> Result<()> { Ok(()) }
///     async fn remove_reaction(&self, reaction: &str, message: &Message) -> Result<()> { Ok(()) }
///     async fn reactions(&self, message: &Message) -> Result<Vec<String>> { Ok(vec![]) }
/// }
/// ```
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a message
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Reply in the channel/thread of `to`
    async fn reply(&self, to: &Message, text: &str) -> Result<()> {
        self.send(OutboundMessage::reply_to(to, text)).await
    }

    /// Reply with an error-level message
    async fn reply_error(&self, to: &Message, text: &str) -> Result<()> {
        self.send(OutboundMessage::error(to, text)).await
    }

    /// Add a reaction (emoji name without colons) to a message
    async fn add_reaction(&self, reaction: &str, message: &Message) -> Result<()>;

    /// Remove a reaction previously added by the bot
    async fn remove_reaction(&self, reaction: &str, message: &Message) -> Result<()>;

    /// Current reactions on a message
    async fn reactions(&self, message: &Message) -> Result<Vec<String>>;

    /// Display name of a user; defaults to the ID
    async fn user_name(&self, user_id: &str) -> Result<String> {
        Ok(user_id.to_string())
    }
}
