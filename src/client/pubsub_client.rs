//! Client representation
//!
//! `Client` is the broker's registry entry for one connected client. It owns
//! the sending side of the client's delivery queue, the outbox feeding it,
//! the set of channels the client has joined, and the handle that closes the
//! delivery queue when the client is deregistered.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::broker::dispatch::Outbox;
use crate::broker::message::PublishedMessage;
use crate::client::delivery::DeliveryChannel;

pub type ClientId = String;

pub type DeliverySender = mpsc::Sender<Arc<PublishedMessage>>;

/// Capacity of a client's delivery queue. One slot: a send completes only
/// once the previous message has been taken by the writer task.
pub const DELIVERY_CAPACITY: usize = 1;

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub sender: DeliverySender,
    pub channels: HashSet<String>,
    outbox: Option<Outbox>,
    closer: oneshot::Sender<()>,
}

impl Client {
    /// Create a registry entry together with the receiving half the
    /// transport drains.
    pub fn new(id: &str) -> (Self, DeliveryChannel) {
        let (sender, receiver) = mpsc::channel(DELIVERY_CAPACITY);
        let (closer, closed) = oneshot::channel();
        let client = Self {
            id: id.to_string(),
            sender,
            channels: HashSet::new(),
            outbox: None,
            closer,
        };
        (client, DeliveryChannel::new(id, receiver, closed))
    }

    /// Start the task that feeds the delivery queue from this client's
    /// outbox, bounding each message by `timeout`. Needs a Tokio runtime.
    pub fn start_dispatch(&mut self, timeout: Duration) {
        if self.outbox.is_none() {
            let (outbox, _) = Outbox::spawn(&self.id, self.sender.clone(), timeout);
            self.outbox = Some(outbox);
        }
    }

    /// Queue a message for delivery behind anything already pending.
    /// Returns `false` when dispatch was never started or has stopped.
    pub fn dispatch(&self, message: Arc<PublishedMessage>) -> bool {
        match &self.outbox {
            Some(outbox) => outbox.push(message),
            None => false,
        }
    }

    /// Close the delivery queue. Sends still in flight fail instead of
    /// waiting for the dispatch timeout.
    pub fn close(self) {
        let _ = self.closer.send(());
    }
}
