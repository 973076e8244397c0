//! # minichat
//!
//! `minichat` is an in-memory publish/subscribe chat broker. Clients connect
//! over WebSockets, join named channels, and receive what other members
//! publish to them.
//!
//! ## Core Modules
//!
//! - `broker`: client registry, channel index and message fanout.
//! - `client`: a registered client and the delivery channel drained by its
//!   connection.
//! - `config`: loading server configuration.
//! - `transport`: the WebSocket server and wire format.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
