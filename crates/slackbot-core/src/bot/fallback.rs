//! Suggestions for messages no command understood.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::Dispatcher;
use crate::channel::{ChatClient, Message, REACTION_CONFUSED};
use crate::command::HelpEntry;

/// Keywords further away than this are never suggested.
const MAX_DISTANCE: usize = 4;

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Finds the closest known command for unmatched text.
pub struct FallbackResolver {
    client: Arc<dyn ChatClient>,
    dispatcher: Dispatcher,
    keywords: Vec<String>,
}

impl FallbackResolver {
    pub fn new(client: Arc<dyn ChatClient>, dispatcher: Dispatcher, entries: &[HelpEntry]) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in entries.iter().flat_map(HelpEntry::keywords) {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self {
            client,
            dispatcher,
            keywords,
        }
    }

    /// Closest keyword within the distance threshold; the first one wins ties.
    pub fn resolve(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        let text_len = text.chars().count();
        let mut best: Option<(&str, usize)> = None;

        for keyword in &self.keywords {
            // The length difference is a lower bound of the distance.
            if keyword.chars().count().abs_diff(text_len) > MAX_DISTANCE {
                continue;
            }
            let distance = edit_distance(keyword, &text);
            if distance <= MAX_DISTANCE && best.is_none_or(|(_, current)| distance < current) {
                best = Some((keyword.as_str(), distance));
            }
        }
        best.map(|(keyword, _)| keyword)
    }

    /// Answer a message no command matched.
    ///
    /// With a suggestion, `help <suggestion>` is submitted as an internal
    /// message, unless the unmatched message was internal itself.
    pub async fn handle_unmatched(&self, message: &Message) -> Result<()> {
        let Some(best) = self.resolve(&message.text) else {
            debug!("No suggestion for '{}'", message.text);
            self.client.add_reaction(REACTION_CONFUSED, message).await?;
            return self
                .client
                .reply(
                    message,
                    &format!(
                        "Oops! Command `{}` not found...try `help`.",
                        message.text
                    ),
                )
                .await;
        };

        debug!("Suggesting '{}' for '{}'", best, message.text);
        self.client
            .reply(
                message,
                &format!(
                    "Command `{}` not found...do you mean *{}* command?",
                    message.text, best
                ),
            )
            .await?;

        if !message.internal {
            self.dispatcher
                .submit_internal_message(message.with_text(format!("help {}", best)));
        }
        Ok(())
    }
}
