//! Command registry.
//!
//! Commands are registered once at startup in a fixed order. The registry
//! compiles them into matchers on first use and evaluates those matchers in
//! registration order: the first match wins and nothing else runs.

mod delay;
mod help;
mod reply;
mod template;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::channel::Message;
use crate::matcher::Matcher;

pub use delay::{DelayCommand, parse_duration};
pub use help::HelpCommand;
pub use reply::ReplyCommand;
pub use template::render_template;

/// Named function usable in reply templates, called with its arguments.
pub type TemplateFunction = Arc<dyn Fn(&[&str]) -> String + Send + Sync>;

/// Template functions by name.
pub type TemplateFunctions = BTreeMap<&'static str, TemplateFunction>;

/// A chat command.
///
/// Only [`Command::matcher`] is required; the other capabilities are
/// optional and default to "enabled, no help, no template functions".
pub trait Command: Send + Sync + 'static {
    /// Compile the command into its matcher.
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher>;

    /// Disabled commands are skipped at registration.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Keyword and example metadata for `help` and the fallback search.
    fn help(&self) -> Vec<HelpEntry> {
        Vec::new()
    }

    /// Functions this command contributes to reply templates.
    fn template_functions(&self) -> TemplateFunctions {
        TemplateFunctions::new()
    }
}

/// Help metadata of one command form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpEntry {
    pub command: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

impl HelpEntry {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Lower-cased search keywords: command, examples and category name.
    pub fn keywords(&self) -> Vec<String> {
        std::iter::once(&self.command)
            .chain(self.examples.iter())
            .chain(self.category.iter().map(|c| &c.name))
            .map(|k| k.to_lowercase())
            .collect()
    }
}

/// Group of related commands in the help overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Ordered command registry.
#[derive(Default)]
pub struct Commands {
    commands: Vec<Arc<dyn Command>>,
    /// Mirrors `commands` 1:1; reset whenever commands are added.
    compiled: OnceCell<Vec<Box<dyn Matcher>>>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command unless it is disabled.
    pub fn add(&mut self, command: impl Command) -> &mut Self {
        self.add_shared(Some(Arc::new(command)))
    }

    /// Append a shared command; `None` and disabled commands are skipped.
    pub fn add_shared(&mut self, command: Option<Arc<dyn Command>>) -> &mut Self {
        if let Some(command) = command.filter(|c| c.is_enabled()) {
            self.commands.push(command);
            self.compiled = OnceCell::new();
        }
        self
    }

    /// Append every command of another registry, keeping its order.
    pub fn merge(&mut self, other: Commands) -> &mut Self {
        if !other.commands.is_empty() {
            self.commands.extend(other.commands);
            self.compiled = OnceCell::new();
        }
        self
    }

    /// Number of registered commands
    pub fn count(&self) -> usize {
        self.commands.len()
    }

    fn matchers(&self) -> &[Box<dyn Matcher>] {
        self.compiled.get_or_init(|| {
            debug!("Compiling {} command matchers", self.commands.len());
            self.commands
                .iter()
                .map(|command| command.clone().matcher())
                .collect()
        })
    }

    /// Run the first matching command.
    ///
    /// Returns whether any command matched. Action failures are logged and
    /// still count as matched.
    pub async fn run(&self, message: &Message) -> bool {
        let Some(matched) = self.matchers().iter().find_map(|m| m.try_match(message)) else {
            return false;
        };

        if let Some(action) = matched.action
            && let Err(e) = action(message.clone(), matched.result).await
        {
            error!("Command '{}' from {} failed: {}", message.text, message.user, e);
        }
        true
    }

    /// Help entries of all commands, in registration order.
    pub fn help(&self) -> Vec<HelpEntry> {
        self.commands.iter().flat_map(|c| c.help()).collect()
    }

    /// Template functions of all commands; later registrations win on name clashes.
    pub fn template_functions(&self) -> TemplateFunctions {
        self.commands
            .iter()
            .flat_map(|c| c.template_functions())
            .collect()
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commands")
            .field("count", &self.commands.len())
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}
