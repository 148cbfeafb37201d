//! Slackbot Core - command dispatch and pending-command coordination
//!
//! The core receives normalized [`Message`]s, matches them against an
//! ordered set of [`Command`]s (first match wins), serializes processing per
//! user, suggests commands for unmatched text and coordinates blocking
//! commands with their `queue`/`then` continuations.
//!
//! ```text
//! transport ──► AppCore::inbound ──► Bot ──► Commands ──► actions
//!                                     ▲                     │
//!                                     └──── Dispatcher ◄────┘
//!                                     (internal messages)
//! ```

pub mod app;
pub mod bot;
pub mod channel;
pub mod command;
pub mod config;
pub mod matcher;
pub mod queue;
#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use app::{AppCore, PluginContext};
pub use bot::{Authorizer, Bot, Dispatcher};
pub use channel::{ChatClient, Message, MessageLevel, OutboundMessage};
pub use command::{Category, Command, Commands, HelpEntry};
pub use config::{BotConfig, ConfigError};
pub use queue::{QueueError, RunningCommand, RunningCommands};
