//! `reply <text>` - answers with the given text.
//!
//! Mostly useful as the continuation of `then`/`delay`, e.g.
//! `then reply deploy finished`.

use std::sync::Arc;

use anyhow::Result;

use super::template::render_template;
use super::{Command, HelpEntry, TemplateFunctions};
use crate::channel::{ChatClient, Message};
use crate::matcher::{MatchResult, Matcher, PrefixMatcher, action};

pub struct ReplyCommand {
    client: Arc<dyn ChatClient>,
    functions: TemplateFunctions,
}

impl ReplyCommand {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            functions: TemplateFunctions::new(),
        }
    }

    /// Expand `{{name args}}` placeholders in replies with these functions.
    pub fn with_template_functions(mut self, functions: TemplateFunctions) -> Self {
        self.functions = functions;
        self
    }

    async fn reply(&self, message: Message, result: MatchResult) -> Result<()> {
        let text = result.get_str(PrefixMatcher::TEXT);
        if text.is_empty() {
            return self.client.reply_error(&message, "Usage: `reply <text>`").await;
        }
        let text = render_template(text, &self.functions);
        self.client.reply(&message, &text).await
    }
}

impl Command for ReplyCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        Box::new(PrefixMatcher::new(
            "reply",
            action(move |message, result| {
                let this = self.clone();
                async move { this.reply(message, result).await }
            }),
        ))
    }

    fn help(&self) -> Vec<HelpEntry> {
        vec![
            HelpEntry::new("reply", "Just reply the given message")
                .with_examples(["reply Hello World", "reply jobs: {{countBackgroundJobs}}"]),
        ]
    }
}
