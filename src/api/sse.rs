//! SSE transport: frames the subscription dispatcher's poke stream and the
//! bulk-import progress channel as Server-Sent Events.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::api::auth;
use crate::query::ConsumerGroup;
use crate::subscription::{self, SubscriptionRequest};

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    pub stream: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub position: u64,
    pub consumer: Option<u64>,
    pub size: Option<u64>,
    pub correlation: Option<String>,
    pub token: Option<String>,
}

/// `GET /subscribe`: emits a `ready` comment once the catch-up scan has
/// started, then one `data:` frame per poke, forever (until the client
/// disconnects and the stream's [`crate::pubsub::Subscription`] guard
/// drops).
pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SubscribeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let token = auth::extract_token(&headers, params.token.as_deref())?;
    let namespace_id = auth::authenticate(state.store.registry(), &token)?;

    let consumer_group = match (params.consumer, params.size) {
        (Some(member), Some(size)) => Some(ConsumerGroup::new(member, size)?),
        _ => None,
    };
    let request = SubscriptionRequest {
        stream: params.stream,
        category: params.category,
        all: params.all,
        position: params.position,
        consumer_group,
        correlation: params.correlation,
    };

    let handle = state.store.handle(&namespace_id).await?;
    let (subscription, pokes) = subscription::subscribe(handle.kv.clone(), &state.bus, &namespace_id, request)?;

    // The subscription guard must outlive every poke it produces; threading
    // it through `stream::unfold`'s state keeps it alive for exactly as
    // long as the stream is polled, and drops it (deregistering from the
    // bus) the moment the client disconnects.
    let pokes = stream::unfold((subscription, Box::pin(pokes)), |(guard, mut inner)| async move {
        inner.next().await.map(|poke| (poke, (guard, inner)))
    });

    let ready = stream::once(async { Event::default().comment("ready") });
    let frames = ready.chain(pokes.map(|poke| {
        Event::default().data(serde_json::to_string(&poke).expect("PokeData always serializes"))
    }));
    let frames: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(frames.map(Ok));

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_params_default_all_and_position() {
        let params: SubscribeParams = serde_json::from_str(r#"{"category":"account"}"#).unwrap();
        assert!(!params.all);
        assert_eq!(params.position, 0);
        assert_eq!(params.category.as_deref(), Some("account"));
    }
}
