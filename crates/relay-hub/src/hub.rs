//! Subscriber set and fan-out.
//!
//! Every subscriber owns a bounded queue. `broadcast` only ever calls
//! `try_send`, so a slow or dead subscriber can neither block the relay nor
//! make the broadcast fail for anyone else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use relay_core::{RelayMessage, StatusEvent};
use relay_telemetry::Metrics;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Queue must at least hold the two initial notices.
const MIN_SUBSCRIBER_BUFFER: usize = 2;

pub type SubscriberId = u64;

/// Receiving side handed to the gateway on registration.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<str>>,
}

/// Fan-out hub for serialized downstream messages.
pub struct BroadcastHub {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
    last_status: RwLock<Option<StatusEvent>>,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(MIN_SUBSCRIBER_BUFFER),
            last_status: RwLock::new(None),
        }
    }

    /// Add a subscriber.
    ///
    /// The welcome notice and the "connecting" notice are queued before the
    /// subscriber becomes visible to `broadcast`, so they are always the
    /// first two messages it sees.
    pub fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel(self.buffer);

        for notice in [StatusEvent::welcome(), StatusEvent::connecting_upstream()] {
            if let Some(json) = encode(&RelayMessage::Status(notice)) {
                // Fresh queue with room for both; cannot be full.
                let _ = tx.try_send(json);
            }
        }

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.push(Subscriber { id, tx });
            subscribers.len()
        };
        Metrics::subscribers_set(count);
        info!(subscriber = id, subscribers = count, "Subscriber registered");

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            (subscribers.len() != before, subscribers.len())
        };
        if removed {
            Metrics::subscribers_set(count);
            info!(subscriber = id, subscribers = count, "Subscriber unregistered");
        }
        removed
    }

    /// Enqueue a serialized message for every open subscriber.
    ///
    /// Returns the number of subscribers the message was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        let payload: Arc<str> = Arc::from(message);
        let mut delivered = 0;
        let mut saw_closed = false;

        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                match subscriber.tx.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(subscriber = subscriber.id, "Subscriber queue full, dropping message");
                        Metrics::broadcast_dropped();
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            self.prune_closed();
        }

        Metrics::broadcast_delivered(delivered);
        delivered
    }

    /// Serialize and broadcast. Status messages are remembered for
    /// [`last_status`](Self::last_status).
    pub fn broadcast_message(&self, message: &RelayMessage) -> usize {
        if let RelayMessage::Status(status) = message {
            *self.last_status.write() = Some(status.clone());
        }

        match encode(message) {
            Some(json) => self.broadcast(&json),
            None => 0,
        }
    }

    /// Most recent upstream status broadcast through the hub.
    pub fn last_status(&self) -> Option<StatusEvent> {
        self.last_status.read().clone()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    fn prune_closed(&self) {
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|s| !s.tx.is_closed());
            subscribers.len()
        };
        Metrics::subscribers_set(count);
        debug!(subscribers = count, "Pruned closed subscribers");
    }
}

fn encode(message: &RelayMessage) -> Option<Arc<str>> {
    match message.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize downstream message");
            None
        }
    }
}
