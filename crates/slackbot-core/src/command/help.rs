//! `help` and `help <keyword>`.

use std::sync::Arc;

use anyhow::Result;

use super::{Command, HelpEntry};
use crate::channel::{ChatClient, Message};
use crate::matcher::{MatchResult, Matcher, PrefixMatcher, action};

const GENERAL_CATEGORY: &str = "General";

pub struct HelpCommand {
    client: Arc<dyn ChatClient>,
    entries: Vec<HelpEntry>,
}

impl HelpCommand {
    /// Build the help command over the entries of all other commands.
    pub fn new(client: Arc<dyn ChatClient>, mut entries: Vec<HelpEntry>) -> Self {
        entries.extend(Self::own_entries());
        Self { client, entries }
    }

    fn own_entries() -> Vec<HelpEntry> {
        vec![
            HelpEntry::new("help", "Show all commands, or details of one")
                .with_examples(["help", "help then"]),
        ]
    }

    fn overview(&self) -> String {
        let mut categories: Vec<(&str, &str, Vec<&HelpEntry>)> = Vec::new();
        for entry in &self.entries {
            let (name, description) = entry
                .category
                .as_ref()
                .map(|c| (c.name.as_str(), c.description.as_str()))
                .unwrap_or((GENERAL_CATEGORY, ""));
            match categories.iter_mut().find(|(n, _, _)| *n == name) {
                Some((_, _, entries)) => entries.push(entry),
                None => categories.push((name, description, vec![entry])),
            }
        }

        let mut text = String::from("*Available commands*\n");
        for (name, description, entries) in categories {
            text.push('\n');
            if description.is_empty() {
                text.push_str(&format!("*{}*\n", name));
            } else {
                text.push_str(&format!("*{}* - {}\n", name, description));
            }
            for entry in entries {
                text.push_str(&format!("• `{}` - {}\n", entry.command, entry.description));
            }
        }
        text.push_str("\nType `help <command>` for details.");
        text
    }

    fn details(&self, keyword: &str) -> Option<String> {
        let keyword = keyword.to_lowercase();
        let found: Vec<&HelpEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.keywords().contains(&keyword))
            .collect();
        if found.is_empty() {
            return None;
        }

        let blocks: Vec<String> = found
            .into_iter()
            .map(|entry| {
                let mut block = format!("*{}*\n{}", entry.command, entry.description);
                if !entry.examples.is_empty() {
                    block.push_str("\n_Examples:_");
                    for example in &entry.examples {
                        block.push_str(&format!("\n`{}`", example));
                    }
                }
                block
            })
            .collect();
        Some(blocks.join("\n\n"))
    }

    async fn show(&self, message: Message, result: MatchResult) -> Result<()> {
        let keyword = result.get_str(PrefixMatcher::TEXT);
        if keyword.is_empty() {
            return self.client.reply(&message, &self.overview()).await;
        }

        match self.details(keyword) {
            Some(text) => self.client.reply(&message, &text).await,
            None => {
                self.client
                    .reply(&message, &format!("No help found for `{}`", keyword))
                    .await
            }
        }
    }
}

impl Command for HelpCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        Box::new(PrefixMatcher::new(
            "help",
            action(move |message, result| {
                let this = self.clone();
                async move { this.show(message, result).await }
            }),
        ))
    }

    fn help(&self) -> Vec<HelpEntry> {
        Self::own_entries()
    }
}
