//! Event broadcaster
//! Fan-out hub delivering events to independently buffered subscriber mailboxes
//!
//! Delivery is best-effort and at-most-once: a full mailbox drops the event for
//! that subscriber only and the producer never waits.

use crate::constants::events::MAILBOX_CAPACITY;
use crate::domain::ServiceEvent;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, info};
use uuid::Uuid;

pub struct EventBroadcaster {
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<ServiceEvent>>>,
    capacity: usize,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(MAILBOX_CAPACITY)
    }

    /// Broadcaster whose mailboxes hold `capacity` undelivered events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new mailbox. Dropping the returned subscription unsubscribes it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.insert(id, tx);

        info!(
            subscriber_id = %id,
            subscribers = subscribers.len(),
            "Event subscriber registered"
        );

        Subscription {
            id,
            receiver: rx,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Remove and close a mailbox. Returns false if it was already gone.
    ///
    /// The sender is dropped while the write lock is held, so a close can never
    /// interleave with a delivery to the same mailbox.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = subscribers.remove(&id).is_some();

        if removed {
            info!(
                subscriber_id = %id,
                subscribers = subscribers.len(),
                "Event subscriber removed"
            );
        }
        removed
    }

    /// Push `event` to every mailbox without blocking.
    /// Returns the number of subscribers that accepted it.
    pub fn broadcast(&self, event: &ServiceEvent) -> usize {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(
                        subscriber_id = %id,
                        event = %event.kind,
                        "Subscriber mailbox full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = %id, "Subscriber mailbox closed");
                }
            }
        }
        delivered
    }

    /// Close every mailbox. Subscribers drain what is buffered, then their streams end.
    pub fn close_all(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let closed = subscribers.len();
        subscribers.clear();

        if closed > 0 {
            info!(subscribers = closed, "Closed all event subscribers");
        }
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one subscriber mailbox
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<ServiceEvent>,
    broadcaster: Weak<EventBroadcaster>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or None once the mailbox has been closed and drained
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = ServiceEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}
