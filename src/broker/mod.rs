pub mod action;
pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod message;

pub use action::{Action, ActionOutcome};
pub use engine::Broker;
pub use message::PublishedMessage;
