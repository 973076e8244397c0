//! Broker engine
//!
//! This module contains the in-memory broker responsible for:
//! - registering and deregistering clients
//! - keeping the client -> channels and channel -> clients indices in step
//! - fanning published messages out to every other subscriber
//!
//! Concurrency notes:
//! - Both indices live in one `BrokerState` behind a single `RwLock`, so they
//!   are always observed and mutated together. Mutations take the write lock
//!   for their whole critical section.
//! - `publish` holds the read lock only to push the message onto each
//!   recipient's outbox, which never blocks. Each client's dispatcher task
//!   drains its outbox in order, bounding every send by the dispatch timeout,
//!   so a stalled subscriber never holds up the publisher, the lock or the
//!   other recipients.
//! - A channel exists exactly while it has subscribers: the first subscribe
//!   creates it and the last unsubscribe or deregistration removes it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::broker::action::{Action, ActionOutcome};
use crate::broker::channel::Channel;
use crate::broker::dispatch::DISPATCH_TIMEOUT;
use crate::broker::message::PublishedMessage;
use crate::client::{Client, ClientId, DeliveryChannel};
use crate::utils::error::{BrokerError, Result};

#[derive(Debug, Default)]
pub(crate) struct BrokerState {
    pub(crate) clients: HashMap<ClientId, Client>,
    pub(crate) channels: HashMap<String, Channel>,
}

/// Handle to one broker instance. Clones share state; separate `new` calls
/// do not.
#[derive(Debug, Clone)]
pub struct Broker {
    state: Arc<RwLock<BrokerState>>,
    dispatch_timeout: Duration,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::with_dispatch_timeout(DISPATCH_TIMEOUT)
    }

    pub fn with_dispatch_timeout(dispatch_timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState::default())),
            dispatch_timeout,
        }
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }

    /// Register a client and hand back the delivery channel the transport
    /// should drain.
    pub async fn register(&self, client_id: &str) -> Result<DeliveryChannel> {
        self.register_bounded(client_id, usize::MAX).await
    }

    /// Like `register`, but refuses with `AtCapacity` once `max_clients`
    /// clients are registered. The check and the insert happen under one
    /// write lock.
    pub async fn register_bounded(
        &self,
        client_id: &str,
        max_clients: usize,
    ) -> Result<DeliveryChannel> {
        let mut state = self.state.write().await;

        if state.clients.len() >= max_clients {
            return Err(BrokerError::AtCapacity { limit: max_clients });
        }
        if state.clients.contains_key(client_id) {
            return Err(BrokerError::AlreadyRegistered {
                client_id: client_id.to_string(),
            });
        }

        let (mut client, delivery) = Client::new(client_id);
        client.start_dispatch(self.dispatch_timeout);
        state.clients.insert(client.id.clone(), client);
        info!(
            "Registered client {client_id} ({} total)",
            state.clients.len()
        );

        Ok(delivery)
    }

    /// Remove a client, close its delivery channel and drop it from every
    /// channel it had joined. Channels left without subscribers go away.
    pub async fn deregister(&self, client_id: &str) -> Result<()> {
        let mut state = self.state.write().await;

        let client = state
            .clients
            .remove(client_id)
            .ok_or_else(|| BrokerError::NotRegistered {
                client_id: client_id.to_string(),
            })?;

        for channel in &client.channels {
            state.leave(client_id, channel);
        }
        let joined = client.channels.len();
        client.close();

        info!(
            "Deregistered client {client_id}, left {joined} channel(s) ({} total remaining)",
            state.clients.len()
        );
        Ok(())
    }

    /// Subscribe a registered client to a channel, creating the channel if
    /// needed. Returns the channel's subscriber count afterwards.
    pub async fn subscribe(&self, client_id: &str, channel: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let state = &mut *state;

        let client = state
            .clients
            .get_mut(client_id)
            .ok_or_else(|| BrokerError::UnknownClient {
                client_id: client_id.to_string(),
            })?;

        let entry = state.channels.entry(channel.to_string()).or_insert_with(|| {
            debug!("Creating channel {channel}");
            Channel::new(channel)
        });
        entry.subscribe(client_id.to_string());
        client.channels.insert(channel.to_string());

        let total = entry.len();
        info!("{client_id} subscribed to {channel} ({total} subscriber(s))");
        Ok(total)
    }

    pub async fn unsubscribe(&self, client_id: &str, channel: &str) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.clients.contains_key(client_id) {
            return Err(BrokerError::UnknownClient {
                client_id: client_id.to_string(),
            });
        }
        if !state.channels.contains_key(channel) {
            return Err(BrokerError::UnknownChannel {
                channel: channel.to_string(),
            });
        }

        if let Some(client) = state.clients.get_mut(client_id) {
            client.channels.remove(channel);
        }
        state.leave(client_id, channel);

        info!("{client_id} unsubscribed from {channel}");
        Ok(())
    }

    /// Fan `content` out to every subscriber of `channel` except the sender.
    ///
    /// Returns once the message is queued on every recipient's outbox; it
    /// does not wait for any delivery. Messages from one sender reach each
    /// recipient in publish order. The return value is the number of
    /// recipients dispatched to.
    pub async fn publish(&self, sender: &str, channel: &str, content: &str) -> Result<usize> {
        let state = self.state.read().await;

        let entry = state
            .channels
            .get(channel)
            .ok_or_else(|| BrokerError::UnknownChannel {
                channel: channel.to_string(),
            })?;

        let message = Arc::new(PublishedMessage::new(sender, channel, content));
        let mut count = 0;
        for sub_id in entry.subscribers.iter().filter(|id| id.as_str() != sender) {
            match state.clients.get(sub_id) {
                Some(client) => {
                    if client.dispatch(Arc::clone(&message)) {
                        count += 1;
                    }
                }
                None => warn!("No client registered with id {sub_id}; skipping"),
            }
        }
        drop(state);

        debug!("{sender} published to {channel}, dispatched to {count} recipient(s)");
        Ok(count)
    }

    /// Route one typed action from `client_id`.
    pub async fn process(&self, client_id: &str, action: Action) -> Result<ActionOutcome> {
        match action {
            Action::Subscribe { channel_name } => {
                let total_subscribers = self.subscribe(client_id, &channel_name).await?;
                Ok(ActionOutcome::Subscribed {
                    channel_name,
                    total_subscribers,
                })
            }
            Action::Unsubscribe { channel_name } => {
                self.unsubscribe(client_id, &channel_name).await?;
                Ok(ActionOutcome::Unsubscribed)
            }
            Action::Publish {
                channel_name,
                content,
            } => {
                let recipients = self.publish(client_id, &channel_name, &content).await?;
                Ok(ActionOutcome::Published { recipients })
            }
        }
    }

    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.state.read().await.channels.len()
    }

    pub async fn is_registered(&self, client_id: &str) -> bool {
        self.state.read().await.clients.contains_key(client_id)
    }

    /// Channels a client has joined, sorted. `None` if not registered.
    pub async fn channels_of(&self, client_id: &str) -> Option<Vec<String>> {
        let state = self.state.read().await;
        state.clients.get(client_id).map(|client| {
            let mut channels: Vec<String> = client.channels.iter().cloned().collect();
            channels.sort();
            channels
        })
    }

    /// Subscribers of a channel, sorted. `None` if the channel does not exist.
    pub async fn subscribers_of(&self, channel: &str) -> Option<Vec<ClientId>> {
        let state = self.state.read().await;
        state.channels.get(channel).map(|entry| {
            let mut subscribers: Vec<ClientId> = entry.subscribers.iter().cloned().collect();
            subscribers.sort();
            subscribers
        })
    }

    #[cfg(test)]
    pub(crate) async fn read_state(&self) -> tokio::sync::RwLockReadGuard<'_, BrokerState> {
        self.state.read().await
    }
}

impl BrokerState {
    /// Drop `client_id` from `channel`'s subscriber set, removing the channel
    /// once nobody is left. The caller keeps the client side in step.
    fn leave(&mut self, client_id: &str, channel: &str) {
        let now_empty = match self.channels.get_mut(channel) {
            Some(entry) => {
                entry.unsubscribe(client_id);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.channels.remove(channel);
            debug!("Removed empty channel {channel}");
        }
    }
}
