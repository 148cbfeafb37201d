//! Built-in matcher kinds.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use super::{Action, Match, MatchResult, Matcher};
use crate::channel::Message;

/// Matches the whole text exactly, ignoring case.
pub struct TextMatcher {
    text: String,
    action: Action,
}

impl TextMatcher {
    pub fn new(text: &str, action: Action) -> Self {
        Self {
            text: text.to_lowercase(),
            action,
        }
    }
}

impl Matcher for TextMatcher {
    fn try_match(&self, message: &Message) -> Option<Match> {
        if message.text.to_lowercase() != self.text {
            return None;
        }
        let result = MatchResult::new().with(MatchResult::MATCH, message.text.clone());
        Some(Match::new(self.action.clone(), result))
    }
}

/// Matches a leading word, ignoring case.
///
/// `reply` matches `reply` and `reply hello`, but not `replying`. The rest of
/// the text is available as `text`.
pub struct PrefixMatcher {
    prefix: String,
    action: Action,
}

impl PrefixMatcher {
    /// Capture name of the text following the prefix
    pub const TEXT: &'static str = "text";

    pub fn new(prefix: &str, action: Action) -> Self {
        Self {
            prefix: prefix.to_lowercase(),
            action,
        }
    }
}

impl Matcher for PrefixMatcher {
    fn try_match(&self, message: &Message) -> Option<Match> {
        let text = &message.text;
        let head = text.get(..self.prefix.len())?;
        if !head.eq_ignore_ascii_case(&self.prefix) && head.to_lowercase() != self.prefix {
            return None;
        }
        let rest = &text[self.prefix.len()..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }

        let result = MatchResult::new()
            .with(MatchResult::MATCH, text.clone())
            .with(Self::TEXT, rest.trim());
        Some(Match::new(self.action.clone(), result))
    }
}

/// Matches the whole text against a regular expression, ignoring case.
///
/// Named capture groups are copied into the [`MatchResult`]; groups that did
/// not participate are absent.
pub struct RegexMatcher {
    regex: Regex,
    action: Action,
}

impl RegexMatcher {
    /// Compile `pattern`, anchored at both ends.
    pub fn new(pattern: &str, action: Action) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(true)
            .build()?;
        Ok(Self { regex, action })
    }
}

impl Matcher for RegexMatcher {
    fn try_match(&self, message: &Message) -> Option<Match> {
        let captures = self.regex.captures(&message.text)?;

        let mut result = MatchResult::new().with(MatchResult::MATCH, message.text.clone());
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                result.insert(name, value.as_str());
            }
        }
        Some(Match::new(self.action.clone(), result))
    }
}

/// Tries its children in order, first match wins.
#[derive(Default)]
pub struct GroupMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl GroupMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }
}

impl Matcher for GroupMatcher {
    fn try_match(&self, message: &Message) -> Option<Match> {
        self.matchers.iter().find_map(|m| m.try_match(message))
    }
}

/// Runs a callback during matching.
///
/// The callback returns whether it handled the message; its work is already
/// done at that point, so the resulting [`Match`] carries no action.
pub struct WildcardMatcher {
    callback: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
}

impl WildcardMatcher {
    pub fn new(callback: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl Matcher for WildcardMatcher {
    fn try_match(&self, message: &Message) -> Option<Match> {
        (self.callback)(message).then(Match::handled)
    }
}

/// Never matches. Used by commands that only contribute help or templates.
pub struct VoidMatcher;

impl Matcher for VoidMatcher {
    fn try_match(&self, _message: &Message) -> Option<Match> {
        None
    }
}
