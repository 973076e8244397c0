//! Wire shapes for the WebSocket protocol.
//!
//! Inbound: `{"action": "subscribe", "params": {"channel_name": "room1"}}`.
//! Outbound responses: `{"status": "ok"}`, optionally with an `info` object.

use serde::{Deserialize, Serialize};

use crate::broker::{Action, ActionOutcome};
use crate::utils::error::{BrokerError, Result};

#[derive(Debug, Deserialize, Serialize)]
pub struct ClientMessage {
    pub action: String,
    #[serde(default)]
    pub params: ActionParams,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ActionParams {
    pub channel_name: Option<String>,
    pub content: Option<String>,
}

impl ClientMessage {
    pub fn into_action(self) -> Result<Action> {
        Action::new(&self.action, self.params.channel_name, self.params.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResponseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_subscribers: Option<usize>,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<ResponseInfo>,
}

impl ServerResponse {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            info: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            info: Some(ResponseInfo {
                detail: Some(detail.into()),
                ..Default::default()
            }),
        }
    }

    /// Sent once when a connection has been registered.
    pub fn connected(client_name: &str) -> Self {
        Self {
            status: Status::Ok,
            info: Some(ResponseInfo {
                client_name: Some(client_name.to_string()),
                ..Default::default()
            }),
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings and integers: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"error"}"#.to_string())
    }
}

impl From<ActionOutcome> for ServerResponse {
    fn from(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Subscribed {
                channel_name,
                total_subscribers,
            } => Self {
                status: Status::Ok,
                info: Some(ResponseInfo {
                    channel_name: Some(channel_name),
                    total_subscribers: Some(total_subscribers),
                    ..Default::default()
                }),
            },
            ActionOutcome::Unsubscribed | ActionOutcome::Published { .. } => Self::ok(),
        }
    }
}

impl From<BrokerError> for ServerResponse {
    fn from(err: BrokerError) -> Self {
        Self::error(err.to_string())
    }
}

impl From<Result<ActionOutcome>> for ServerResponse {
    fn from(result: Result<ActionOutcome>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(err) => err.into(),
        }
    }
}
