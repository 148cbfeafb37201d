//! Matchers - compiled predicate + action pairs.
//!
//! A [`Command`](crate::command::Command) compiles into one [`Matcher`]. The
//! registry asks each matcher in registration order whether it understands a
//! message; the first [`Match`] wins and its action runs.
//!
//! Matching is side-effect free, except for [`WildcardMatcher`], whose
//! callback does its work while matching and therefore yields no action.

mod kinds;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;

use crate::channel::Message;

pub use kinds::{
    GroupMatcher, PrefixMatcher, RegexMatcher, TextMatcher, VoidMatcher, WildcardMatcher,
};

/// Async handler invoked with the matched message and its captures.
pub type Action = Arc<dyn Fn(Message, MatchResult) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async closure into an [`Action`].
///
/// ```ignore
/// let this = self.clone();
/// let run = action(move |message, result| {
///     let this = this.clone();
///     async move { this.reply(message, result).await }
/// });
/// ```
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn(Message, MatchResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |message, result| Box::pin(f(message, result)))
}

/// Outcome of a successful match.
pub struct Match {
    /// `None` when the matcher already did its work while matching.
    pub action: Option<Action>,
    pub result: MatchResult,
}

impl Match {
    pub fn new(action: Action, result: MatchResult) -> Self {
        Self {
            action: Some(action),
            result,
        }
    }

    /// A match whose effect already happened.
    pub fn handled() -> Self {
        Self {
            action: None,
            result: MatchResult::default(),
        }
    }
}

/// Compiled matcher of a command.
pub trait Matcher: Send + Sync {
    /// Test a message; `None` means "not mine".
    fn try_match(&self, message: &Message) -> Option<Match>;
}

/// Named values extracted while matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    values: HashMap<String, String>,
}

impl MatchResult {
    /// Key holding the complete matched text
    pub const MATCH: &'static str = "match";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of `name`, empty when absent
    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// The complete matched text
    pub fn matched_text(&self) -> &str {
        self.get_str(Self::MATCH)
    }
}
