//! In-process event bus carrying typed events from publishers to UIs.
//!
//! Every subscriber owns an unbounded channel, so each one observes every
//! event published while it is subscribed, in publish order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// A message on the bus: a type discriminator plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source: None,
            data,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Publish/subscribe capability. Implementations must support one publisher
/// fanning out to many subscribers from any thread.
pub trait EventBus: Send + Sync {
    /// Deliver `event` to every current subscriber; returns how many received it.
    fn publish(&self, event: Event) -> usize;

    fn subscribe(&self) -> Subscription;

    /// Detach every subscriber. Buffered events can still be drained.
    fn close(&self);
}

type Subscribers = Arc<Mutex<Vec<(u64, UnboundedSender<Event>)>>>;

/// Default bus with no external transport.
#[derive(Default)]
pub struct InMemoryBus {
    subscribers: Subscribers,
    next_id: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Total events published, including ones nobody received.
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl EventBus for InMemoryBus {
    fn publish(&self, event: Event) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, sender)| !sender.is_closed());
        for (_, sender) in subscribers.iter() {
            let _ = sender.send(event.clone());
        }
        if subscribers.is_empty() {
            debug!(event_type = %event.event_type, "Event dropped (no subscribers)");
        }
        subscribers.len()
    }

    fn subscribe(&self) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock();
        if !self.closed.load(Ordering::Acquire) {
            subscribers.push((id, sender));
        }
        drop(subscribers);
        Subscription {
            receiver,
            unsubscriber: Unsubscriber {
                id,
                subscribers: Arc::clone(&self.subscribers),
            },
        }
    }

    fn close(&self) {
        let mut subscribers = self.subscribers.lock();
        self.closed.store(true, Ordering::Release);
        subscribers.clear();
    }
}

/// Detaches one subscription from its bus. Cloneable so UIs can hold it.
#[derive(Clone)]
pub struct Unsubscriber {
    id: u64,
    subscribers: Subscribers,
}

impl Unsubscriber {
    /// Handle for a run without a bus; unsubscribing does nothing.
    pub fn detached() -> Self {
        Self {
            id: u64::MAX,
            subscribers: Subscribers::default(),
        }
    }

    /// Stop receiving new events. Idempotent.
    pub fn unsubscribe(&self) {
        self.subscribers.lock().retain(|(id, _)| *id != self.id);
    }
}

impl std::fmt::Debug for Unsubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscriber").field("id", &self.id).finish()
    }
}

/// Receiving end of one subscription.
pub struct Subscription {
    receiver: UnboundedReceiver<Event>,
    unsubscriber: Unsubscriber,
}

impl Subscription {
    /// Next event, or `None` once unsubscribed (or the bus closed) and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscriber(&self) -> Unsubscriber {
        self.unsubscriber.clone()
    }

    pub fn unsubscribe(&self) {
        self.unsubscriber.unsubscribe();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscriber.unsubscribe();
    }
}

/// Default BusConstructor.
pub fn new_in_memory_bus(
    _config: &crate::config::AppConfig,
) -> anyhow::Result<Option<Arc<dyn EventBus>>> {
    Ok(Some(Arc::new(InMemoryBus::new())))
}
