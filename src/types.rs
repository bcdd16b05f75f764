//! Core data types for the event log: messages, namespaces, and the
//! stream-name parsing rules that the rest of the engine builds on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Reserved metadata field read by the correlation filter.
pub const CORRELATION_FIELD: &str = "correlationStreamName";

/// A single persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub stream_name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub position: u64,
    pub global_position: u64,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub time: DateTime<Utc>,
}

impl Message {
    /// The wire tuple form used by the RPC surface:
    /// `[id, stream_name, type, position, global_position, data, metadata, time]`.
    pub fn to_wire_tuple(&self) -> serde_json::Value {
        serde_json::json!([
            self.id,
            self.stream_name,
            self.event_type,
            self.position,
            self.global_position,
            self.data,
            self.metadata,
            self.time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ])
    }

    /// Category of the stream this message belongs to.
    pub fn category(&self) -> &str {
        stream_category(&self.stream_name)
    }

    /// Value of `metadata.correlationStreamName`, if present and a string.
    pub fn correlation_stream_name(&self) -> Option<&str> {
        self.metadata.as_ref()?.get(CORRELATION_FIELD)?.as_str()
    }
}

/// An isolated tenant. Created once, never mutated except via delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub credential_hash: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// `category(stream_name)` — substring before the first `-`, or the whole
/// name if there is no `-`.
pub fn stream_category(stream_name: &str) -> &str {
    match stream_name.split_once('-') {
        Some((category, _)) => category,
        None => stream_name,
    }
}

/// `cardinal_id(stream_name)` — substring after the first `-`, possibly empty.
pub fn stream_cardinal_id(stream_name: &str) -> &str {
    match stream_name.split_once('-') {
        Some((_, cardinal)) => cardinal,
        None => "",
    }
}

/// The portion of a cardinal id used for consumer-group hashing: everything
/// up to (not including) the first `+` composite-cardinal separator.
pub fn consumer_group_key(stream_name: &str) -> &str {
    let cardinal = stream_cardinal_id(stream_name);
    match cardinal.split_once('+') {
        Some((primary, _)) => primary,
        None => cardinal,
    }
}

/// Validates a stream name. `:` is forbidden because it's the key-codec
/// field separator.
pub fn validate_stream_name(stream_name: &str) -> Result<()> {
    if stream_name.is_empty() {
        return Err(Error::invalid_request("stream name must not be empty"));
    }
    if stream_name.contains(':') {
        return Err(Error::invalid_request(
            "stream name must not contain ':'",
        ));
    }
    Ok(())
}
