//! Registry of in-flight blocking commands.
//!
//! A command that starts a long operation registers a [`RunningCommand`] for
//! its conversation context and resolves it when done. `then`/`queue` waits on
//! the handle. When a fallback command is given, a pending entry is persisted
//! so a restart can replay the fallback instead of losing the continuation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Result;
use parking_lot::RwLock;
use slackbot_storage::Storage;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::channel::{Message, format_timestamp, parse_timestamp};
use crate::command::{TemplateFunction, TemplateFunctions};

/// Storage collection of pending queue entries.
pub const PENDING_COLLECTION: &str = "pending_queue";

const TIMESTAMP_WIDTH: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("A command is already running for '{key}'")]
    AlreadyRunning { key: String },
}

/// Storage key of a pending entry: zero-padded timestamp digits, then the
/// unique key, so lexical order is chronological.
pub fn pending_key(message: &Message) -> String {
    let timestamp = parse_timestamp(&message.timestamp)
        .map(format_timestamp)
        .unwrap_or_else(|| message.timestamp.clone());
    format!(
        "{:0>width$}-{}",
        timestamp.replace('.', ""),
        message.unique_key(),
        width = TIMESTAMP_WIDTH
    )
}

/// Handle of one in-flight blocking operation.
///
/// A single-fire gate: exactly one [`resolve`](RunningCommand::resolve),
/// any number of [`wait`](RunningCommand::wait)ers, all released together.
#[derive(Clone)]
pub struct RunningCommand {
    gate: Arc<Gate>,
}

struct Gate {
    key: String,
    pending_key: Option<String>,
    resolved: AtomicBool,
    tx: watch::Sender<bool>,
    registry: Weak<Inner>,
}

impl RunningCommand {
    fn new(key: String, pending_key: Option<String>, registry: Weak<Inner>) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            gate: Arc::new(Gate {
                key,
                pending_key,
                resolved: AtomicBool::new(false),
                tx,
                registry,
            }),
        }
    }

    /// Unique key of the conversation context
    pub fn key(&self) -> &str {
        &self.gate.key
    }

    pub fn is_resolved(&self) -> bool {
        self.gate.resolved.load(Ordering::SeqCst)
    }

    /// Mark the operation as finished.
    ///
    /// Removes the handle from its registry and deletes the pending entry
    /// before waking the waiters, so a continuation may register the same key
    /// again. Resolving twice is a caller bug.
    pub fn resolve(&self) {
        if self.gate.resolved.swap(true, Ordering::SeqCst) {
            if cfg!(debug_assertions) {
                panic!("running command '{}' resolved twice", self.gate.key);
            }
            warn!("Running command '{}' resolved twice, ignoring", self.gate.key);
            return;
        }

        if let Some(registry) = self.gate.registry.upgrade() {
            registry.release(self);
        }
        self.gate.tx.send_replace(true);
        debug!("Running command '{}' resolved", self.gate.key);
    }

    /// Wait until the operation is resolved. No timeout.
    pub async fn wait(&self) {
        let mut rx = self.gate.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|resolved| *resolved).await;
    }

    fn ptr_eq(&self, other: &RunningCommand) -> bool {
        Arc::ptr_eq(&self.gate, &other.gate)
    }
}

impl std::fmt::Debug for RunningCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningCommand")
            .field("key", &self.gate.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

struct Inner {
    commands: RwLock<HashMap<String, RunningCommand>>,
    storage: Storage,
}

impl Inner {
    fn release(&self, handle: &RunningCommand) {
        {
            let mut commands = self.commands.write();
            if commands
                .get(handle.key())
                .is_some_and(|current| current.ptr_eq(handle))
            {
                commands.remove(handle.key());
            }
        }

        if let Some(pending_key) = &handle.gate.pending_key
            && let Err(e) = self.storage.delete(PENDING_COLLECTION, pending_key)
        {
            warn!("Failed to delete pending entry '{}': {}", pending_key, e);
        }
    }
}

/// Shared registry of running commands, keyed by [`Message::unique_key`].
#[derive(Clone)]
pub struct RunningCommands {
    inner: Arc<Inner>,
}

impl RunningCommands {
    pub fn new(storage: Storage) -> Self {
        Self {
            inner: Arc::new(Inner {
                commands: RwLock::new(HashMap::new()),
                storage,
            }),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Register a blocking command started by `message`.
    ///
    /// A non-empty `fallback` is persisted as a pending entry and replayed on
    /// restart if the command never resolves. Persistence failures are logged;
    /// the in-memory tracking proceeds regardless.
    pub fn register(
        &self,
        message: &Message,
        fallback: &str,
    ) -> std::result::Result<RunningCommand, QueueError> {
        let key = message.unique_key();
        let pending_key = (!fallback.is_empty()).then(|| pending_key(message));
        let handle = RunningCommand::new(
            key.clone(),
            pending_key.clone(),
            Arc::downgrade(&self.inner),
        );

        {
            let mut commands = self.inner.commands.write();
            if commands.contains_key(&key) {
                return Err(QueueError::AlreadyRunning { key });
            }
            commands.insert(key.clone(), handle.clone());
        }

        if let Some(pending_key) = &pending_key {
            let entry = message.with_text(fallback);
            if let Err(e) = self
                .inner
                .storage
                .write(PENDING_COLLECTION, pending_key, &entry)
            {
                warn!("Failed to persist pending entry '{}': {}", pending_key, e);
            }
        }

        debug!("Registered running command '{}'", key);
        Ok(handle)
    }

    /// Running command of the conversation context of `message`, if any.
    pub fn get(&self, message: &Message) -> Option<RunningCommand> {
        self.inner
            .commands
            .read()
            .get(&message.unique_key())
            .cloned()
    }

    /// Number of unresolved running commands
    pub fn count_active(&self) -> usize {
        self.inner.commands.read().len()
    }

    /// Number of pending entries posted in `channel`.
    pub fn count_active_in_channel(&self, channel: &str) -> usize {
        match self.pending_entries() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, message)| message.channel == channel)
                .count(),
            Err(e) => {
                warn!("Failed to read pending entries: {}", e);
                0
            }
        }
    }

    /// All persisted pending entries, oldest first.
    ///
    /// Entries that cannot be read are skipped with a warning.
    pub fn pending_entries(&self) -> Result<Vec<(String, Message)>> {
        let storage = &self.inner.storage;
        let keys = storage.list_keys(PENDING_COLLECTION)?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            match storage.read::<Message>(PENDING_COLLECTION, &key) {
                Ok(message) => entries.push((key, message)),
                Err(e) => warn!("Skipping unreadable pending entry '{}': {}", key, e),
            }
        }
        Ok(entries)
    }

    /// Snapshot the persisted pending entries and clear the collection.
    ///
    /// Clearing before re-injection lets replayed commands persist new
    /// entries under the same keys without them being wiped.
    pub fn take_pending(&self) -> Result<Vec<(String, Message)>> {
        let entries = self.pending_entries()?;
        if !entries.is_empty() {
            self.inner.storage.delete_collection(PENDING_COLLECTION)?;
        }
        Ok(entries)
    }

    /// Persist `messages` again as pending entries, e.g. replayed entries
    /// that were never processed.
    pub fn restore_pending(&self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut restored = 0;
        for message in messages {
            let key = pending_key(&message);
            match self.inner.storage.write(PENDING_COLLECTION, &key, &message) {
                Ok(()) => restored += 1,
                Err(e) => warn!("Failed to restore pending entry '{}': {}", key, e),
            }
        }
        restored
    }

    /// Send taken entries to `inbound`, oldest first.
    ///
    /// When the channel closes midway the unsent entries are restored to
    /// storage. Returns the number of sent messages.
    pub async fn replay(
        &self,
        entries: Vec<(String, Message)>,
        inbound: &mpsc::Sender<Message>,
    ) -> usize {
        let mut entries = entries.into_iter();
        let mut replayed = 0;
        while let Some((key, message)) = entries.next() {
            debug!("Replaying pending entry '{}': {}", key, message.text);
            if let Err(mpsc::error::SendError(message)) = inbound.send(message).await {
                let unsent = std::iter::once(message).chain(entries.by_ref().map(|(_, m)| m));
                let restored = self.restore_pending(unsent);
                warn!(
                    "Inbound channel closed while replaying, restored {} pending entries",
                    restored
                );
                break;
            }
            replayed += 1;
        }
        replayed
    }

    /// Re-inject every persisted pending entry as a fresh message.
    ///
    /// See [`take_pending`](Self::take_pending) and [`replay`](Self::replay).
    /// Returns the number of replayed messages; a no-op when nothing is
    /// pending.
    pub async fn replay_persisted(&self, inbound: &mpsc::Sender<Message>) -> Result<usize> {
        let entries = self.take_pending()?;
        if entries.is_empty() {
            return Ok(0);
        }
        info!("Replaying {} pending queue entries", entries.len());
        Ok(self.replay(entries, inbound).await)
    }

    /// `countBackgroundJobs` and `countBackgroundJobsInChannel <channel>`.
    pub fn template_functions(&self) -> TemplateFunctions {
        let mut functions = TemplateFunctions::new();

        let this = self.clone();
        let count: TemplateFunction = Arc::new(move |_| this.count_active().to_string());
        functions.insert("countBackgroundJobs", count);

        let this = self.clone();
        let count_in_channel: TemplateFunction = Arc::new(move |args| {
            args.first()
                .map(|channel| this.count_active_in_channel(channel))
                .unwrap_or_default()
                .to_string()
        });
        functions.insert("countBackgroundJobsInChannel", count_in_channel);

        functions
    }
}

impl std::fmt::Debug for RunningCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningCommands")
            .field("active", &self.count_active())
            .finish()
    }
}
