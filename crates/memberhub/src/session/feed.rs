//! Cross-context change notifications.
//!
//! A [`ChangeFeed`] carries "slot `key` now holds `new_value`" events between
//! execution contexts that share a [`SlotStore`](super::SlotStore). Like
//! browser storage events, a context never sees its own writes: every event
//! carries its origin and each [`ChangeStream`] skips events from its owner.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Default number of undelivered events a subscriber may fall behind by.
const DEFAULT_CAPACITY: usize = 64;

/// Identifies one execution context (one tab, one process, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate an id unique within this process.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A slot mutation made by one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The context that made the change.
    pub origin: ContextId,
    /// The slot key that changed.
    pub key: String,
    /// The new serialized value, or `None` if the slot was deleted.
    pub new_value: Option<String>,
}

/// Publish/subscribe over a named channel.
pub trait ChangeFeed: Send + Sync {
    /// Name of the channel this feed carries.
    fn channel(&self) -> &str;

    /// Deliver an event to every subscriber except its origin.
    fn publish(&self, event: ChangeEvent);

    /// Subscribe on behalf of `subscriber`; its own events are filtered out.
    fn subscribe(&self, subscriber: ContextId) -> ChangeStream;
}

/// Events delivered to one subscriber.
#[derive(Debug)]
pub struct ChangeStream {
    subscriber: ContextId,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    /// Wrap a broadcast receiver for `subscriber`.
    #[must_use]
    pub fn new(subscriber: ContextId, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { subscriber, rx }
    }

    /// The context this stream belongs to.
    #[must_use]
    pub fn subscriber(&self) -> ContextId {
        self.subscriber
    }

    /// Wait for the next foreign event. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.subscriber => {}
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(subscriber = %self.subscriber, missed, "change stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next foreign event if one is already waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.subscriber => {}
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(subscriber = %self.subscriber, missed, "change stream lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// A change feed for contexts living in the same process.
///
/// Clones publish to and subscribe from the same channel.
#[derive(Debug, Clone)]
pub struct InProcessFeed {
    channel: String,
    tx: broadcast::Sender<ChangeEvent>,
}

impl InProcessFeed {
    /// Create a feed with the default capacity.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self::with_capacity(channel, DEFAULT_CAPACITY)
    }

    /// Create a feed that buffers up to `capacity` undelivered events.
    #[must_use]
    pub fn with_capacity(channel: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            channel: channel.into(),
            tx,
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeFeed for InProcessFeed {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine; nobody needs to resynchronize.
        let _ = self.tx.send(event);
    }

    fn subscribe(&self, subscriber: ContextId) -> ChangeStream {
        ChangeStream::new(subscriber, self.tx.subscribe())
    }
}
