//! Queue subsystem.
//!
//! ```text
//! delay / plugin ──register──► RunningCommands ──persist──► pending_queue
//!                                    │ ▲
//!                            resolve │ │ get + wait
//!                                    ▼ │
//!                   `then reply done` (QueueCommand) ──► Dispatcher (internal)
//! ```
//!
//! On startup every surviving pending entry is replayed as a fresh message.

mod list;
mod running;
mod then;

pub use list::{ListQueueCommand, format_elapsed};
pub use running::{PENDING_COLLECTION, QueueError, RunningCommand, RunningCommands, pending_key};
pub use then::{QueueCommand, queue_category};
