//! The `client` module defines the representation of a client in the broker.
//!
//! It provides the `Client` registry entry and the `DeliveryChannel` the
//! transport drains to push published messages out to one connection.

pub mod delivery;
pub mod pubsub_client;

pub use delivery::DeliveryChannel;
pub use pubsub_client::{Client, ClientId, DeliverySender};
