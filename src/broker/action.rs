//! Typed inbound actions
//!
//! `Action::new` is the broker's defensive check on what the request parser
//! hands it: the action name must be one it knows, and the parameters that
//! action needs must be present and non-empty.

use crate::utils::error::{BrokerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Subscribe {
        channel_name: String,
    },
    Unsubscribe {
        channel_name: String,
    },
    Publish {
        channel_name: String,
        content: String,
    },
}

/// What a successfully processed action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Subscribed {
        channel_name: String,
        total_subscribers: usize,
    },
    Unsubscribed,
    Published {
        recipients: usize,
    },
}

impl Action {
    pub fn new(action: &str, channel_name: Option<String>, content: Option<String>) -> Result<Self> {
        match action {
            "subscribe" => Ok(Action::Subscribe {
                channel_name: required(action, "channel_name", channel_name)?,
            }),
            "unsubscribe" => Ok(Action::Unsubscribe {
                channel_name: required(action, "channel_name", channel_name)?,
            }),
            "publish" => Ok(Action::Publish {
                channel_name: required(action, "channel_name", channel_name)?,
                content: required(action, "content", content)?,
            }),
            other => Err(BrokerError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Subscribe { .. } => "subscribe",
            Action::Unsubscribe { .. } => "unsubscribe",
            Action::Publish { .. } => "publish",
        }
    }
}

fn required(action: &str, parameter: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BrokerError::MissingParameter {
            action: action.to_string(),
            parameter,
        }),
    }
}
