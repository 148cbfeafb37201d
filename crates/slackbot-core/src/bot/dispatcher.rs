//! Internal re-entry into the dispatch pipeline.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::channel::Message;

/// Handle for re-injecting messages and spawning continuation tasks.
///
/// Cheap to clone; every clone feeds the same internal channel and the same
/// task tracker, so shutdown can wait for everything spawned through it.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Message>,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create a dispatcher and the receiving end of its internal channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            tx,
            tracker: TaskTracker::new(),
        };
        (dispatcher, rx)
    }

    /// Submit a message that skips authorization and the per-user lock.
    pub fn submit_internal_message(&self, message: Message) {
        let message = message.into_internal();
        debug!(
            "Submitting internal message '{}' for {}",
            message.text, message.user
        );
        if self.tx.send(message).is_err() {
            debug!("Dispatch loop stopped, internal message dropped");
        }
    }

    /// Run a continuation task tracked for shutdown.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(future);
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}
