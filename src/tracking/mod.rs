mod hub;
mod message;

pub use hub::TrackingHub;
pub use message::{Command, EventKind, InboundMessage, MessageKind, OutboundEvent};
