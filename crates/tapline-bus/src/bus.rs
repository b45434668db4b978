//! The bus itself: subscription registry and fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{BusError, BusResult};
use crate::filter::TopicFilter;

/// A message delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

impl Message {
    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> BusResult<T> {
        serde_json::from_slice(&self.payload).map_err(|source| BusError::Decode {
            topic: self.topic.clone(),
            source,
        })
    }
}

struct Subscriber {
    id: u64,
    filter: TopicFilter,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process topic bus. Cheap to clone; all clones share subscriptions.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every topic matching `filter`.
    pub fn subscribe(&self, filter: &str) -> BusResult<Subscription> {
        let filter = TopicFilter::new(filter)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner.subscribers().push(Subscriber {
            id,
            filter: filter.clone(),
            tx,
        });
        debug!(subscription = id, %filter, "subscribed");

        Ok(Subscription { id, filter, rx })
    }

    /// Publish a raw payload. Returns the number of subscriptions reached.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> BusResult<usize> {
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }

        let message = Message {
            topic: topic.to_string(),
            payload: payload.into(),
        };

        let mut subscribers = self.inner.subscribers();
        let mut delivered = 0;
        subscribers.retain(|sub| {
            if !sub.filter.matches(topic) {
                return !sub.tx.is_closed();
            }
            match sub.tx.send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(subscription = sub.id, "pruned closed subscription");
                    false
                }
            }
        });

        trace!(%topic, delivered, "published");
        Ok(delivered)
    }

    /// Serialize `value` as JSON and publish it.
    pub fn publish_json<T: Serialize>(&self, topic: &str, value: &T) -> BusResult<usize> {
        let payload = serde_json::to_vec(value).map_err(BusError::Encode)?;
        self.publish(topic, payload)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers();
        subscribers.retain(|sub| !sub.tx.is_closed());
        subscribers.len()
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    filter: TopicFilter,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    /// Wait for the next message. `None` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_matching_subscriptions_only() {
        let bus = Bus::new();
        let mut status = bus.subscribe("tap-1/keg/+/status").unwrap();
        let mut display = bus.subscribe("tap-1/ui/display").unwrap();

        let delivered = bus.publish("tap-1/keg/keg-a/status", "{}").unwrap();
        assert_eq!(delivered, 1);

        let msg = status.recv().await.unwrap();
        assert_eq!(msg.topic, "tap-1/keg/keg-a/status");
        assert!(display.try_recv().is_none());
    }

    #[tokio::test]
    async fn preserves_publish_order() {
        let bus = Bus::new();
        let mut sub = bus.subscribe("#").unwrap();

        for i in 0..10 {
            bus.publish("tap-1/ui/event", format!("{i}")).unwrap();
        }

        for i in 0..10 {
            let msg = sub.recv().await.unwrap();
            assert_eq!(msg.payload, Bytes::from(format!("{i}")));
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = Bus::new();
        assert_eq!(bus.publish("tap-1/ui/display", "{}").unwrap(), 0);
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let bus = Bus::new();
        let sub = bus.subscribe("tap-1/#").unwrap();
        let _keep = bus.subscribe("tap-2/#").unwrap();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub);
        assert_eq!(bus.publish("tap-1/ui/display", "{}").unwrap(), 0);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn rejects_wildcard_topics_on_publish() {
        let bus = Bus::new();
        assert!(matches!(
            bus.publish("tap-1/keg/+/status", "{}"),
            Err(BusError::InvalidTopic(_))
        ));
        assert!(bus.publish("", "{}").is_err());
    }

    #[test]
    fn rejects_invalid_filters_on_subscribe() {
        let bus = Bus::new();
        assert!(bus.subscribe("tap-1/#/status").is_err());
    }

    #[tokio::test]
    async fn json_round_trip_and_decode_errors() {
        let bus = Bus::new();
        let mut sub = bus.subscribe("tap-1/ui/event").unwrap();

        bus.publish_json("tap-1/ui/event", &serde_json::json!({"event": "POUR_START"}))
            .unwrap();
        bus.publish("tap-1/ui/event", "not json").unwrap();

        let good: serde_json::Value = sub.recv().await.unwrap().json().unwrap();
        assert_eq!(good["event"], "POUR_START");

        let bad = sub.recv().await.unwrap().json::<serde_json::Value>();
        assert!(matches!(bad, Err(BusError::Decode { .. })));
    }

    #[tokio::test]
    async fn recv_ends_when_bus_dropped() {
        let bus = Bus::new();
        let mut sub = bus.subscribe("#").unwrap();
        drop(bus);
        assert!(sub.recv().await.is_none());
    }
}
