//! Timeout dispatcher
//!
//! Hands published messages to one recipient's delivery queue, giving up on
//! each after a fixed bound. Delivery is best effort and at most once: a
//! message that times out or hits a closed queue is dropped for that
//! recipient only, with no retry.
//!
//! Every registered client gets one `Outbox`. Publishing pushes onto it
//! without blocking, and a single task per client drains it in push order,
//! so messages from one sender reach one receiver in the order they were
//! published. The bound for each message runs from the moment it was pushed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::broker::message::PublishedMessage;
use crate::client::{ClientId, DeliverySender};
use crate::utils::error::{BrokerError, Result};

/// Default bound on how long one recipient may hold up a delivery.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
struct Pending {
    message: Arc<PublishedMessage>,
    deadline: Instant,
}

/// Ordered, non-blocking entry point to one client's delivery queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    client_id: ClientId,
    timeout: Duration,
    pending: mpsc::UnboundedSender<Pending>,
}

impl Outbox {
    /// Start the dispatcher task for `client_id`. Must be called from within
    /// a Tokio runtime.
    ///
    /// The task stops once every `Outbox` handle is dropped or the delivery
    /// queue is closed.
    pub fn spawn(
        client_id: &str,
        sender: DeliverySender,
        timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (pending, queue) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_dispatcher(
            client_id.to_string(),
            sender,
            queue,
            timeout,
        ));
        let outbox = Self {
            client_id: client_id.to_string(),
            timeout,
            pending,
        };
        (outbox, handle)
    }

    /// Queue `message` behind anything already pending. Returns `false` if
    /// the dispatcher has stopped.
    pub fn push(&self, message: Arc<PublishedMessage>) -> bool {
        let pending = Pending {
            message,
            deadline: Instant::now() + self.timeout,
        };
        if self.pending.send(pending).is_err() {
            debug!(
                "Dispatcher for {} has stopped; message dropped",
                self.client_id
            );
            return false;
        }
        true
    }
}

/// Try to enqueue `message` for `client_id`, waiting at most `timeout` for
/// the queue to accept it.
pub async fn deliver_with_timeout(
    client_id: &str,
    sender: &DeliverySender,
    message: Arc<PublishedMessage>,
    timeout: Duration,
) -> Result<()> {
    deliver_by(client_id, sender, message, Instant::now() + timeout, timeout).await
}

async fn deliver_by(
    client_id: &str,
    sender: &DeliverySender,
    message: Arc<PublishedMessage>,
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout_at(deadline, sender.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(BrokerError::RecipientClosed {
            client_id: client_id.to_string(),
        }),
        Err(_) => Err(BrokerError::DispatchTimeout {
            client_id: client_id.to_string(),
            timeout,
        }),
    }
}

async fn run_dispatcher(
    client_id: String,
    sender: DeliverySender,
    mut queue: mpsc::UnboundedReceiver<Pending>,
    timeout: Duration,
) {
    while let Some(Pending { message, deadline }) = queue.recv().await {
        match deliver_by(&client_id, &sender, message, deadline, timeout).await {
            Ok(()) => debug!("Message dispatched to {client_id}"),
            Err(e @ BrokerError::DispatchTimeout { .. }) => warn!("{e}; message dropped"),
            Err(e) => {
                debug!("{e}; stopping dispatcher");
                break;
            }
        }
    }
    queue.close();
    debug!("Dispatcher for {client_id} finished");
}
