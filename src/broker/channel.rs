//! Channel index entries
//!
//! A `Channel` holds the subscriber IDs for one channel name. The broker
//! only keeps a `Channel` around while its subscriber set is non-empty;
//! callers must synchronize access through the broker lock.

use std::collections::HashSet;

use crate::client::ClientId;

#[derive(Debug, Default)]
pub struct Channel {
    pub name: String,
    pub subscribers: HashSet<ClientId>,
}

impl Channel {
    /// Create an empty channel with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    /// Add a subscriber. Duplicate adds are ignored.
    pub fn subscribe(&mut self, id: ClientId) {
        self.subscribers.insert(id);
    }

    /// Remove a subscriber, returning whether it was present.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.subscribers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
