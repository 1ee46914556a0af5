//! In-process message bus: event types and the FIFO queue pair.

pub mod events;
pub mod queue;

pub use events::{InboundMessage, OutboundMessage};
pub use queue::{MessageBus, OutboundHandler};
