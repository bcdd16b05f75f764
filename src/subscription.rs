//! Subscription dispatcher: composes a catch-up store scan with a live
//! bus subscription into one ordered stream of pokes.
//!
//! The "ready marker" clients see on connect is an SSE framing detail
//! emitted by the transport layer (`api::sse`) before it starts polling the
//! stream this module returns, not something dispatched here.

use std::sync::Arc;

use futures::stream::StreamExt as _;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt as _};

use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::pubsub::{PubSubBus, SubscriberFilter, Subscription, WriteEvent};
use crate::query::{self, category_scan, stream_scan, CategoryScanOptions, ConsumerGroup, StreamScanOptions};
use crate::types::Message;

impl From<Message> for PokeData {
    fn from(message: Message) -> Self {
        PokeData {
            stream: message.stream_name,
            position: message.position,
            global_position: message.global_position,
        }
    }
}

/// `(stream, position, global_position)` — the wire form of a subscription
/// notification. Never carries a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokeData {
    pub stream: String,
    pub position: u64,
    pub global_position: u64,
}

/// Caller-supplied subscription parameters. Exactly one of `stream`,
/// `category`, `all` must be set.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRequest {
    pub stream: Option<String>,
    pub category: Option<String>,
    pub all: bool,
    pub position: u64,
    pub consumer_group: Option<ConsumerGroup>,
    pub correlation: Option<String>,
}

impl SubscriptionRequest {
    fn validate(&self) -> Result<()> {
        let set = [self.stream.is_some(), self.category.is_some(), self.all];
        if set.iter().filter(|b| **b).count() != 1 {
            return Err(Error::invalid_request(
                "exactly one of stream, category, or all must be set",
            ));
        }
        Ok(())
    }
}

/// Opens a subscription: registers on the bus first (so no write racing the
/// catch-up scan is ever missed), then scans the store up to the current
/// tail, then chains the catch-up pokes ahead of the live ones.
///
/// The returned [`Subscription`] guard must be held by the caller for the
/// lifetime of the stream; dropping it deregisters from the bus.
pub fn subscribe(
    kv: Arc<dyn KvStore>,
    bus: &Arc<PubSubBus>,
    namespace: &str,
    request: SubscriptionRequest,
) -> Result<(Subscription, impl Stream<Item = PokeData>)> {
    request.validate()?;

    let filter = if let Some(stream) = &request.stream {
        SubscriberFilter::Stream(stream.clone())
    } else if let Some(category) = &request.category {
        SubscriberFilter::Category(category.clone())
    } else {
        SubscriberFilter::All
    };
    let (subscription, receiver) = bus.subscribe(namespace, filter);

    let catch_up = run_catch_up(kv.as_ref(), &request)?;

    let consumer_group = request.consumer_group;
    let correlation = request.correlation.clone();
    let live_kv = kv.clone();
    let live = ReceiverStream::new(receiver).filter_map(move |event: WriteEvent| {
        let kv = live_kv.clone();
        let consumer_group = consumer_group;
        let correlation = correlation.clone();
        async move { live_poke(kv.as_ref(), event, consumer_group, correlation.as_deref()) }
    });

    let stream = tokio_stream::iter(catch_up).chain(live);
    Ok((subscription, stream))
}

/// Runs the catch-up scan to the current tail (unlimited batch size).
fn run_catch_up(kv: &dyn KvStore, request: &SubscriptionRequest) -> Result<Vec<PokeData>> {
    if let Some(stream) = &request.stream {
        let messages = stream_scan(
            kv,
            stream,
            StreamScanOptions {
                start_position: request.position,
                batch_size: Some(-1),
                ..Default::default()
            },
        )?;
        Ok(messages.into_iter().map(PokeData::from).collect())
    } else {
        let category = request.category.clone().unwrap_or_default();
        let messages = category_scan(
            kv,
            &category,
            CategoryScanOptions {
                start_global_position: request.position,
                batch_size: Some(-1),
                consumer_group: request.consumer_group,
                correlation: request.correlation.clone(),
            },
        )?;
        Ok(messages.into_iter().map(PokeData::from).collect())
    }
}

/// Applies the consumer-group and correlation filters to one live write
/// event, loading the message body only when a correlation filter is set
/// (the poke itself never carries the body).
fn live_poke(
    kv: &dyn KvStore,
    event: WriteEvent,
    consumer_group: Option<ConsumerGroup>,
    correlation: Option<&str>,
) -> Option<PokeData> {
    if let Some(group) = &consumer_group {
        if !group.admits(&event.stream) {
            return None;
        }
    }
    if correlation.is_some() {
        let message = query::load_message(kv, event.global_position).ok()?;
        if !query::correlation::matches(&message, correlation) {
            return None;
        }
    }
    Some(PokeData {
        stream: event.stream,
        position: event.position,
        global_position: event.global_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::RedbStore;
    use crate::write::{commit, WriteRequest};
    use serde_json::json;
    use tokio::sync::Mutex;

    fn handle_and_kv() -> (crate::store::NamespaceHandle, Arc<dyn KvStore>) {
        let kv: Arc<dyn KvStore> = Arc::new(RedbStore::open_in_memory().unwrap());
        let handle = crate::store::NamespaceHandle {
            kv: kv.clone(),
            write_lock: Mutex::new(()),
        };
        (handle, kv)
    }

    fn write_request(stream: &str) -> WriteRequest {
        WriteRequest {
            stream: stream.to_string(),
            event_type: "Created".to_string(),
            data: json!({}),
            metadata: None,
            id: None,
            expected_version: None,
        }
    }

    #[tokio::test]
    async fn rejects_ambiguous_filter_selection() {
        let kv: Arc<dyn KvStore> = Arc::new(RedbStore::open_in_memory().unwrap());
        let bus = PubSubBus::new();
        let request = SubscriptionRequest {
            stream: Some("account-1".to_string()),
            all: true,
            ..Default::default()
        };
        assert!(subscribe(kv, &bus, "ns", request).is_err());
    }

    #[tokio::test]
    async fn catch_up_then_live_scenario_s5() {
        let (handle, kv) = handle_and_kv();
        let bus = PubSubBus::new();

        for _ in 0..5 {
            commit(&handle, "ns", &bus, false, write_request("account-1")).await.unwrap();
        }

        let request = SubscriptionRequest {
            stream: Some("account-1".to_string()),
            position: 2,
            ..Default::default()
        };
        let (_sub, stream) = subscribe(kv, &bus, "ns", request).unwrap();
        tokio::pin!(stream);

        for expected_position in 2..5u64 {
            let poke = stream.next().await.unwrap();
            assert_eq!(poke.position, expected_position);
        }

        commit(&handle, "ns", &bus, false, write_request("account-1")).await.unwrap();
        let poke = stream.next().await.unwrap();
        assert_eq!(poke.position, 5);
    }

    #[tokio::test]
    async fn consumer_group_filters_live_events() {
        let (handle, kv) = handle_and_kv();
        let bus = PubSubBus::new();

        let request = SubscriptionRequest {
            category: Some("account".to_string()),
            consumer_group: Some(ConsumerGroup { member: 0, size: 2 }),
            ..Default::default()
        };
        let (_sub, stream) = subscribe(kv, &bus, "ns", request).unwrap();
        tokio::pin!(stream);

        for i in 1..=10u64 {
            commit(&handle, "ns", &bus, false, write_request(&format!("account-{i}")))
                .await
                .unwrap();
        }

        let mut received = Vec::new();
        while let Ok(Some(poke)) = tokio::time::timeout(std::time::Duration::from_millis(50), stream.next()).await {
            received.push(poke);
        }
        assert!(!received.is_empty());
        for poke in &received {
            assert!(ConsumerGroup { member: 0, size: 2 }.admits(&poke.stream));
        }
    }
}
