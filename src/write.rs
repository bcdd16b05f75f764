//! Write pipeline: the atomic five-key commit of a single message, with
//! stream-version checking and global-position assignment, executed under
//! the namespace's write mutex.

use chrono::Utc;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::keycodec;
use crate::payload;
use crate::pubsub::{PubSubBus, WriteEvent};
use crate::store::NamespaceHandle;
use crate::types::{self, Message};

/// Caller-supplied fields for a single write.
pub struct WriteRequest {
    pub stream: String,
    pub event_type: String,
    pub data: Value,
    pub metadata: Option<Value>,
    pub id: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub position: u64,
    pub global_position: u64,
}

/// Executes the write pipeline against an already-resolved namespace
/// handle, publishing a write event on success. Holds `handle.write_lock`
/// for its whole duration so concurrent writers to the same namespace are
/// strictly serialized.
pub async fn commit(
    handle: &NamespaceHandle,
    namespace_id: &str,
    bus: &PubSubBus,
    compress: bool,
    request: WriteRequest,
) -> Result<WriteResult> {
    types::validate_stream_name(&request.stream)?;

    let _guard = handle.write_lock.lock().await;
    let kv = handle.kv.as_ref();

    // Step 2: current version, -1 if the stream has never been written.
    let current_version: Option<u64> = match kv.get(&keycodec::version_key(&request.stream))? {
        Some(bytes) => Some(keycodec::decode_position(&bytes)?),
        None => None,
    };
    let current_version_signed = current_version.map(|v| v as i64).unwrap_or(-1);

    // Step 3: optimistic concurrency check.
    if let Some(expected) = request.expected_version {
        if expected != current_version_signed {
            return Err(Error::StreamVersionConflict {
                expected,
                actual: current_version,
            });
        }
    }

    // Step 4: dense next position.
    let new_position = (current_version_signed + 1) as u64;

    // Step 5: global position counter.
    let global_position = match kv.get(keycodec::GLOBAL_POSITION_KEY)? {
        Some(bytes) => keycodec::decode_position(&bytes)?,
        None => 1,
    };

    // Step 6: assign server-controlled fields.
    let message = Message {
        id: request.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        stream_name: request.stream.clone(),
        event_type: request.event_type,
        position: new_position,
        global_position,
        data: request.data,
        metadata: request.metadata,
        time: Utc::now(),
    };
    let category = message.category().to_string();

    // Step 7: encode (+ optionally compress).
    let encoded = payload::encode(&message, compress)?;

    // Step 8: one atomic batch of all five keys.
    let batch = vec![
        (keycodec::message_key(global_position), encoded),
        (
            keycodec::stream_index_key(&request.stream, new_position),
            keycodec::encode_position(global_position),
        ),
        (
            keycodec::category_index_key(&category, global_position),
            request.stream.as_bytes().to_vec(),
        ),
        (
            keycodec::version_key(&request.stream),
            keycodec::encode_position(new_position),
        ),
        (
            keycodec::GLOBAL_POSITION_KEY.to_vec(),
            keycodec::encode_position(global_position + 1),
        ),
    ];

    // Step 9: commit.
    kv.write_batch(batch)?;

    tracing::info!(
        namespace = namespace_id,
        stream = %request.stream,
        position = new_position,
        global_position,
        "message committed"
    );

    // Step 10: publish the write event.
    bus.publish(WriteEvent {
        namespace: namespace_id.to_string(),
        stream: request.stream,
        category,
        position: new_position,
        global_position,
    });

    Ok(WriteResult {
        position: new_position,
        global_position,
    })
}
