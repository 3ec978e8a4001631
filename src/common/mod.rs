pub mod commands;
pub mod error;
pub mod events;
pub mod types;

pub use commands::OutboundCommand;
pub use error::ChatError;
pub use events::{CloseReason, ConnectionEvent};
pub use types::{ChannelState, MessageEnvelope, SentAt, UserRef};
