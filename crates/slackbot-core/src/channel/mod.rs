//! Chat platform abstraction.
//!
//! ```text
//! transport (excluded) ──► Message ──► Bot ──► trait ChatClient
//!                                              - send / reply
//!                                              - reactions
//!                                              - user names
//! ```

mod traits;
mod types;

pub use traits::ChatClient;
pub use types::{
    Message, MessageLevel, OutboundMessage, REACTION_CONFUSED, REACTION_DONE, REACTION_WAITING,
    format_timestamp, parse_timestamp,
};
