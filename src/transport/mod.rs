//! The `transport` module handles network communication with clients over
//! WebSockets.
//!
//! It defines the JSON request/response shapes and the server that parses
//! client frames, forwards them to the broker and writes published messages
//! back out. Plain HTTP requests are answered from the static directory.

pub mod message;
pub mod static_files;
pub mod websocket;

pub use message::{ClientMessage, ServerResponse};
pub use websocket::{serve, start_websocket_server};

#[cfg(test)]
mod websocket_tests;
