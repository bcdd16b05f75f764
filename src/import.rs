//! Bulk import pipeline: ingests a caller-ordered batch of
//! fully-specified messages, bypassing `expected_version` and id
//! auto-generation. Unlike the write pipeline, every index field is
//! supplied by the caller rather than computed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::keycodec;
use crate::payload;
use crate::store::NamespaceHandle;
use crate::types::{self, Message};

/// Chunk size chunked imports are applied in.
const IMPORT_CHUNK_SIZE: usize = 1000;

/// A single record to import, with every index field supplied by the caller.
/// Mirrors the NDJSON wire record
/// (`{id, stream, type, pos, gpos, data, meta, time}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ImportMessage {
    pub id: String,
    pub stream: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "pos")]
    pub position: u64,
    #[serde(rename = "gpos")]
    pub global_position: u64,
    pub data: Value,
    #[serde(rename = "meta", default)]
    pub metadata: Option<Value>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportResult {
    pub imported: usize,
}

/// Executes the bulk import pipeline against an already-resolved namespace
/// handle. Holds `handle.write_lock` for the whole duration, same as the
/// write pipeline.
pub async fn import(handle: &NamespaceHandle, messages: Vec<ImportMessage>) -> Result<ImportResult> {
    import_with_progress(handle, messages, |_, _| {}).await
}

/// Same as [`import`], invoking `on_chunk(cumulative_imported, last_gp)`
/// after each `IMPORT_CHUNK_SIZE`-row chunk commits, where `last_gp` is the
/// global position of the chunk's last row. The `/import` HTTP endpoint
/// uses this to emit one `{imported, gpos}` SSE progress event per chunk
/// without the core pipeline itself knowing anything about SSE.
pub async fn import_with_progress(
    handle: &NamespaceHandle,
    messages: Vec<ImportMessage>,
    mut on_chunk: impl FnMut(usize, u64),
) -> Result<ImportResult> {
    if messages.is_empty() {
        return Ok(ImportResult::default());
    }

    for message in &messages {
        types::validate_stream_name(&message.stream)?;
    }

    let _guard = handle.write_lock.lock().await;
    let kv = handle.kv.as_ref();

    // Step 1: pre-check every M: key is absent, and reject intra-batch
    // duplicate global positions, before performing any write.
    let mut seen_gp = std::collections::HashSet::with_capacity(messages.len());
    for message in &messages {
        if !seen_gp.insert(message.global_position) {
            return Err(Error::PositionExists(message.global_position));
        }
        if kv.get(&keycodec::message_key(message.global_position))?.is_some() {
            return Err(Error::PositionExists(message.global_position));
        }
    }

    // Track the stream version each message would leave behind so multiple
    // messages for the same stream within (or across) chunks resolve to the
    // correct VI: value without re-reading the store mid-import.
    let mut stream_versions: HashMap<String, u64> = HashMap::new();
    for message in &messages {
        match kv.get(&keycodec::version_key(&message.stream))? {
            Some(bytes) => {
                let current = keycodec::decode_position(&bytes)?;
                stream_versions.entry(message.stream.clone()).or_insert(current);
            }
            None => {
                stream_versions.entry(message.stream.clone());
            }
        }
    }

    let current_gp = match kv.get(keycodec::GLOBAL_POSITION_KEY)? {
        Some(bytes) => keycodec::decode_position(&bytes)?,
        None => 1,
    };
    let max_imported_gp = messages.iter().map(|m| m.global_position).max().unwrap_or(0);

    let mut imported = 0usize;
    for chunk in messages.chunks(IMPORT_CHUNK_SIZE) {
        let mut batch = Vec::with_capacity(chunk.len() * 3);
        for message in chunk {
            let category = {
                let full = Message {
                    id: message.id.clone(),
                    stream_name: message.stream.clone(),
                    event_type: message.event_type.clone(),
                    position: message.position,
                    global_position: message.global_position,
                    data: message.data.clone(),
                    metadata: message.metadata.clone(),
                    time: message.time,
                };
                let encoded = payload::encode(&full, false)?;
                batch.push((keycodec::message_key(message.global_position), encoded));
                full.category().to_string()
            };

            batch.push((
                keycodec::stream_index_key(&message.stream, message.position),
                keycodec::encode_position(message.global_position),
            ));
            batch.push((
                keycodec::category_index_key(&category, message.global_position),
                message.stream.as_bytes().to_vec(),
            ));

            let entry = stream_versions.entry(message.stream.clone()).or_insert(message.position);
            if message.position > *entry {
                *entry = message.position;
            }
            batch.push((
                keycodec::version_key(&message.stream),
                keycodec::encode_position(*entry),
            ));
        }

        if max_imported_gp >= current_gp {
            batch.push((
                keycodec::GLOBAL_POSITION_KEY.to_vec(),
                keycodec::encode_position(max_imported_gp + 1),
            ));
        }

        kv.write_batch(batch)?;
        imported += chunk.len();
        let last_gp = chunk.last().map(|m| m.global_position).unwrap_or(0);
        on_chunk(imported, last_gp);
    }

    tracing::info!(imported, "bulk import committed");

    Ok(ImportResult { imported })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::RedbStore;
    use serde_json::json;
    use tokio::sync::Mutex;

    fn handle() -> NamespaceHandle {
        NamespaceHandle {
            kv: std::sync::Arc::new(RedbStore::open_in_memory().unwrap()),
            write_lock: Mutex::new(()),
        }
    }

    fn message(stream: &str, position: u64, global_position: u64) -> ImportMessage {
        ImportMessage {
            id: format!("id-{global_position}"),
            stream: stream.to_string(),
            event_type: "Imported".to_string(),
            position,
            global_position,
            data: json!({}),
            metadata: None,
            time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let handle = handle();
        let result = import(&handle, Vec::new()).await.unwrap();
        assert_eq!(result, ImportResult::default());
    }

    #[tokio::test]
    async fn import_preserves_gaps_and_advances_gp_scenario_s6() {
        let handle = handle();
        let messages = vec![
            message("account-1", 0, 10),
            message("account-1", 1, 50),
            message("account-1", 2, 100),
        ];
        let result = import(&handle, messages).await.unwrap();
        assert_eq!(result.imported, 3);

        let gp_bytes = handle.kv.get(keycodec::GLOBAL_POSITION_KEY).unwrap().unwrap();
        assert_eq!(keycodec::decode_position(&gp_bytes).unwrap(), 101);

        let scanned = crate::query::category_scan(
            handle.kv.as_ref(),
            "account",
            crate::query::CategoryScanOptions::default(),
        )
        .unwrap();
        let gps: Vec<_> = scanned.iter().map(|m| m.global_position).collect();
        assert_eq!(gps, vec![10, 50, 100]);
    }

    #[tokio::test]
    async fn reimporting_existing_global_position_fails_and_leaves_storage_unchanged() {
        let handle = handle();
        import(&handle, vec![message("account-1", 0, 50)]).await.unwrap();

        let err = import(&handle, vec![message("account-1", 1, 50)]).await.unwrap_err();
        assert!(matches!(err, Error::PositionExists(50)));

        let scanned = crate::query::category_scan(
            handle.kv.as_ref(),
            "account",
            crate::query::CategoryScanOptions::default(),
        )
        .unwrap();
        assert_eq!(scanned.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_global_position_within_batch_is_rejected() {
        let handle = handle();
        let messages = vec![message("account-1", 0, 10), message("account-1", 1, 10)];
        let err = import(&handle, messages).await.unwrap_err();
        assert!(matches!(err, Error::PositionExists(10)));
    }

    #[tokio::test]
    async fn subsequent_write_continues_from_imported_gp() {
        let handle = handle();
        import(&handle, vec![message("account-1", 0, 10)]).await.unwrap();

        let bus = crate::pubsub::PubSubBus::new();
        let result = crate::write::commit(
            &handle,
            "ns",
            &bus,
            false,
            crate::write::WriteRequest {
                stream: "account-2".to_string(),
                event_type: "Created".to_string(),
                data: json!({}),
                metadata: None,
                id: None,
                expected_version: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(result.global_position, 11);
    }
}
