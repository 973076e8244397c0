//! Delivery channel
//!
//! The receiving half of a client's delivery queue. The transport keeps it
//! and drains it towards the socket; `recv` yields `None` once the broker has
//! deregistered the client.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::broker::message::PublishedMessage;
use crate::client::ClientId;

#[derive(Debug)]
pub struct DeliveryChannel {
    client_id: ClientId,
    receiver: mpsc::Receiver<Arc<PublishedMessage>>,
    closed: oneshot::Receiver<()>,
    is_closed: bool,
}

impl DeliveryChannel {
    pub(crate) fn new(
        client_id: &str,
        receiver: mpsc::Receiver<Arc<PublishedMessage>>,
        closed: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            receiver,
            closed,
            is_closed: false,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Wait for the next message. Returns `None` after deregistration;
    /// anything still queued at that point is abandoned.
    pub async fn recv(&mut self) -> Option<Arc<PublishedMessage>> {
        if self.is_closed {
            return None;
        }

        tokio::select! {
            biased;
            _ = &mut self.closed => {
                self.shut();
                None
            }
            message = self.receiver.recv() => {
                if message.is_none() {
                    self.shut();
                }
                message
            }
        }
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&mut self) -> Option<Arc<PublishedMessage>> {
        if self.is_closed {
            return None;
        }
        match self.closed.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => self.receiver.try_recv().ok(),
            _ => {
                self.shut();
                None
            }
        }
    }

    fn shut(&mut self) {
        self.is_closed = true;
        self.receiver.close();
    }
}
