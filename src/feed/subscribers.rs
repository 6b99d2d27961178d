//! Price socket subscriber registry
//!
//! Every subscriber owns a bounded queue. Broadcasting is a non-blocking
//! `try_send` per subscriber, so a slow or dead socket never delays the others:
//! a full queue drops that tick for that subscriber only, and a closed queue is
//! skipped until its socket task unregisters it.

use super::FeedEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Subscriber identifier, unique per registry
pub type SubscriberId = u64;

/// Receiving half handed to a socket task
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Arc<FeedEvent>>,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the event
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub lagging: usize,
    /// Subscribers whose socket is gone but not yet unregistered
    pub closed: usize,
}

/// Fan-out registry of open price sockets
pub struct SubscriberRegistry {
    buffer: usize,
    next_id: AtomicU64,
    senders: RwLock<HashMap<SubscriberId, mpsc::Sender<Arc<FeedEvent>>>>,
}

impl SubscriberRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.senders.write().await.insert(id, tx);
        Subscription { id, receiver: rx }
    }

    pub async fn remove(&self, id: SubscriberId) -> bool {
        self.senders.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.senders.read().await.is_empty()
    }

    /// Deliver to a single subscriber (used for the connect snapshot)
    pub async fn send_to(&self, id: SubscriberId, event: Arc<FeedEvent>) -> bool {
        match self.senders.read().await.get(&id) {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    pub async fn broadcast(&self, event: Arc<FeedEvent>) -> BroadcastReport {
        let senders = self.senders.read().await;
        let mut report = BroadcastReport::default();

        for (id, tx) in senders.iter() {
            if tx.is_closed() {
                report.closed += 1;
                continue;
            }
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.lagging += 1;
                    tracing::debug!(subscriber = id, "Subscriber queue full, dropping tick");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => report.closed += 1,
            }
        }

        report
    }
}
