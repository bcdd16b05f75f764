//! In-process publish/subscribe bus: fans out write events to live
//! subscribers, scoped per namespace and filtered by exact stream, exact
//! category, or "all events in this namespace".
//!
//! Delivery is best-effort and at-least-once at the notification level —
//! a full subscriber queue simply drops the newest notification rather
//! than blocking the writer. Subscriber registries are a `dashmap`,
//! matching this codebase's established choice for concurrent registries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

/// Bounded per-subscriber queue depth before notifications start dropping.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// A commit notification, carrying just enough to filter and to build a
/// poke — never the message body.
#[derive(Debug, Clone)]
pub struct WriteEvent {
    pub namespace: String,
    pub stream: String,
    pub category: String,
    pub position: u64,
    pub global_position: u64,
}

/// What a subscriber wants to hear about.
#[derive(Debug, Clone)]
pub enum SubscriberFilter {
    Stream(String),
    Category(String),
    All,
}

impl SubscriberFilter {
    fn matches(&self, event: &WriteEvent) -> bool {
        match self {
            SubscriberFilter::Stream(stream) => *stream == event.stream,
            SubscriberFilter::Category(category) => *category == event.category,
            SubscriberFilter::All => true,
        }
    }
}

struct Registration {
    namespace: String,
    filter: SubscriberFilter,
    sender: mpsc::Sender<WriteEvent>,
}

pub struct PubSubBus {
    next_id: AtomicU64,
    registrations: DashMap<u64, Registration>,
}

impl PubSubBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            registrations: DashMap::new(),
        })
    }

    /// Registers a new subscriber and returns a guard: drop it (or let it
    /// go out of scope, e.g. when the consumer's channel closes) to tear
    /// down the registration. No further delivery happens once the guard
    /// is dropped (`registrations.remove` is atomic, so there's no window
    /// for a publish to race a concurrent deregistration).
    pub fn subscribe(
        self: &Arc<Self>,
        namespace: &str,
        filter: SubscriberFilter,
    ) -> (Subscription, mpsc::Receiver<WriteEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.registrations.insert(
            id,
            Registration {
                namespace: namespace.to_string(),
                filter,
                sender,
            },
        );
        (
            Subscription {
                id,
                bus: self.clone(),
            },
            receiver,
        )
    }

    /// Delivers `event` to every matching, still-registered subscriber.
    /// Never blocks: a full queue drops the notification for that one
    /// subscriber and the rest still proceed.
    pub fn publish(&self, event: WriteEvent) {
        for entry in self.registrations.iter() {
            let registration = entry.value();
            if registration.namespace != event.namespace || !registration.filter.matches(&event) {
                continue;
            }
            if registration.sender.try_send(event.clone()).is_err() {
                tracing::warn!(
                    namespace = %event.namespace,
                    stream = %event.stream,
                    "subscriber queue full or closed, dropping notification"
                );
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.registrations.remove(&id);
    }
}

/// RAII handle for a bus registration; deregisters on drop.
pub struct Subscription {
    id: u64,
    bus: Arc<PubSubBus>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(stream: &str) -> WriteEvent {
        WriteEvent {
            namespace: "ns".to_string(),
            stream: stream.to_string(),
            category: crate::types::stream_category(stream).to_string(),
            position: 0,
            global_position: 1,
        }
    }

    #[tokio::test]
    async fn stream_filter_only_matches_exact_stream() {
        let bus = PubSubBus::new();
        let (_sub, mut rx) = bus.subscribe("ns", SubscriberFilter::Stream("account-1".to_string()));
        bus.publish(event("account-2"));
        bus.publish(event("account-1"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.stream, "account-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn category_filter_matches_any_stream_in_category() {
        let bus = PubSubBus::new();
        let (_sub, mut rx) = bus.subscribe("ns", SubscriberFilter::Category("account".to_string()));
        bus.publish(event("account-1"));
        bus.publish(event("account-2"));
        assert_eq!(rx.recv().await.unwrap().stream, "account-1");
        assert_eq!(rx.recv().await.unwrap().stream, "account-2");
    }

    #[tokio::test]
    async fn namespace_scoping_is_enforced() {
        let bus = PubSubBus::new();
        let (_sub, mut rx) = bus.subscribe("ns-a", SubscriberFilter::All);
        let mut other_ns_event = event("account-1");
        other_ns_event.namespace = "ns-b".to_string();
        bus.publish(other_ns_event);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_subscription_stops_delivery() {
        let bus = PubSubBus::new();
        let (sub, mut rx) = bus.subscribe("ns", SubscriberFilter::All);
        drop(sub);
        bus.publish(event("account-1"));
        assert!(rx.recv().await.is_none() || rx.try_recv().is_err());
    }
}
