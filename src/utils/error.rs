//! The `error` module defines the error taxonomy shared by the broker and
//! the transport.
//!
//! Every variant is recoverable: broker operations report them back to the
//! calling connection as a structured error response, and dispatch failures
//! are only logged. The `Display` text doubles as the `detail` field sent to
//! clients.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Client '{client_id}' already exists")]
    AlreadyRegistered { client_id: String },

    #[error("Client '{client_id}' is not registered")]
    NotRegistered { client_id: String },

    #[error("Client '{client_id}' is not registered")]
    UnknownClient { client_id: String },

    #[error("Server is at capacity")]
    AtCapacity { limit: usize },

    #[error("Channel '{channel}' does not exist")]
    UnknownChannel { channel: String },

    #[error("Unknown action specified: '{action}'")]
    UnknownAction { action: String },

    #[error("Action '{action}' requires a non-empty '{parameter}'")]
    MissingParameter {
        action: String,
        parameter: &'static str,
    },

    #[error("Dispatch to '{client_id}' timed out after {}ms", .timeout.as_millis())]
    DispatchTimeout { client_id: String, timeout: Duration },

    #[error("Delivery channel for '{client_id}' is closed")]
    RecipientClosed { client_id: String },
}

pub type Result<T> = std::result::Result<T, BrokerError>;
