//! Change broadcaster.
//!
//! # Delivery
//!
//! Every subscription owns a bounded channel (default 16 events). Publishing
//! never blocks: a full channel drops the event for that subscriber only, and
//! a closed channel is pruned. A subscriber that stays full for
//! [`MAX_MISSED_EVENTS`] deliveries in a row is treated as dead and pruned
//! too. Delivery is at-most-once with no replay.
//!
//! Publishing snapshots the subscriber table before sending, so subscriptions
//! can come and go concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cache::SummaryCache;

/// Identifies one subscription.
pub type SubscriptionId = u64;

/// Consecutive deliveries a subscriber may miss on a full buffer before it is pruned.
pub const MAX_MISSED_EVENTS: u32 = 8;

struct Slot {
    tx: mpsc::Sender<DatasetEvent>,
    /// Consecutive deliveries dropped because the buffer was full.
    missed: u32,
}

/// Event pushed to subscribers.
///
/// Serializes as `{"type":"data-updated","timestamp":"2024-01-01T00:00:00Z"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DatasetEvent {
    /// First event on every subscription.
    Connected {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// The dataset changed.
    DataUpdated {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Periodic liveness check.
    KeepAlive {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

impl DatasetEvent {
    pub fn connected() -> Self {
        DatasetEvent::Connected {
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn data_updated() -> Self {
        DatasetEvent::DataUpdated {
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn keep_alive() -> Self {
        DatasetEvent::KeepAlive {
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            DatasetEvent::Connected { .. } => "connected",
            DatasetEvent::DataUpdated { .. } => "data-updated",
            DatasetEvent::KeepAlive { .. } => "keep-alive",
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            DatasetEvent::Connected { timestamp }
            | DatasetEvent::DataUpdated { timestamp }
            | DatasetEvent::KeepAlive { timestamp } => *timestamp,
        }
    }

    /// Render as a server-sent-events frame: `data: <json>\n\n`.
    pub fn sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

struct Inner {
    subscribers: Mutex<HashMap<SubscriptionId, Slot>>,
    next_id: AtomicU64,
    buffer: usize,
    cache: SummaryCache,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Slot>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Send to every open subscriber; prune closed and stalled ones. Returns deliveries.
    fn deliver(&self, event: &DatasetEvent) -> usize {
        let snapshot: Vec<(SubscriptionId, mpsc::Sender<DatasetEvent>)> = self
            .lock()
            .iter()
            .map(|(id, slot)| (*id, slot.tx.clone()))
            .collect();

        let mut delivered = Vec::new();
        let mut full = Vec::new();
        let mut closed = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered.push(id),
                Err(TrySendError::Full(_)) => {
                    debug!("Subscriber {} is full, dropping {}", id, event.kind());
                    full.push(id);
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        let mut subscribers = self.lock();
        for id in &delivered {
            if let Some(slot) = subscribers.get_mut(id) {
                slot.missed = 0;
            }
        }
        for id in full {
            if let Some(slot) = subscribers.get_mut(&id) {
                slot.missed += 1;
                if slot.missed >= MAX_MISSED_EVENTS {
                    closed.push(id);
                }
            }
        }
        if !closed.is_empty() {
            for id in &closed {
                subscribers.remove(id);
            }
            debug!("Pruned {} dead subscriber(s)", closed.len());
        }

        delivered.len()
    }
}

/// Fans dataset events out to an open set of subscribers.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// Create a broadcaster that invalidates `cache` on every publish.
    pub fn new(buffer: usize, cache: SummaryCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                cache,
            }),
        }
    }

    /// Open a subscription. Its first event is [`DatasetEvent::Connected`].
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let _ = tx.try_send(DatasetEvent::connected());
        self.inner.lock().insert(id, Slot { tx, missed: 0 });
        debug!("Subscriber {} connected", id);

        Subscription {
            id,
            rx,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription. Returns whether it was open.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            debug!("Subscriber {} unsubscribed", id);
        }
        removed
    }

    /// Invalidate the summary cache and deliver `event` to every subscriber.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: DatasetEvent) -> usize {
        self.inner.cache.invalidate();
        let delivered = self.inner.deliver(&event);
        trace!("Published {} to {} subscriber(s)", event.kind(), delivered);
        delivered
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Send a keep-alive to every subscriber each `period` until `cancel` fires.
    ///
    /// Subscriptions whose receiver is gone or that stopped reading are pruned
    /// on each tick.
    pub fn spawn_keepalive(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = inner.upgrade() else { break };
                        inner.deliver(&DatasetEvent::keep_alive());
                    }
                }
            }
        })
    }
}

/// An open subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<DatasetEvent>,
    broadcaster: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<DatasetEvent> {
        self.rx.recv().await
    }

    /// Next buffered event, if any.
    pub fn try_recv(&mut self) -> Option<DatasetEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broadcaster.upgrade() {
            inner.remove(self.id);
        }
    }
}
