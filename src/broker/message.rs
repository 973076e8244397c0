//! Message definitions for the broker
//!
//! `PublishedMessage` is built once per publish and shared with every
//! recipient behind an `Arc`, so no recipient can observe another's copy
//! change.
//!
//! Notes on fields:
//! - `sender`: identity of the publishing client
//! - `channel_name`: channel the message was published to
//! - `sent_at`: RFC3339 timestamp set by the broker at publish time
//! - `content`: opaque text body

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub sender: String,
    pub channel_name: String,
    pub sent_at: String,
    pub content: String,
}

impl PublishedMessage {
    pub fn new(sender: &str, channel_name: &str, content: &str) -> Self {
        Self {
            sender: sender.to_string(),
            channel_name: channel_name.to_string(),
            sent_at: chrono::Utc::now().to_rfc3339(),
            content: content.to_string(),
        }
    }
}
