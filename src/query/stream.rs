//! Stream scan, last-of-type, and version probe.

use super::{effective_batch_size, load_message, BatchLimit};
use crate::error::{Error, Result};
use crate::keycodec;
use crate::kv::KvStore;
use crate::types::Message;

#[derive(Debug, Clone, Default)]
pub struct StreamScanOptions {
    pub start_position: u64,
    pub global_position_filter: Option<u64>,
    pub batch_size: Option<i64>,
}

/// Iterates `SI:<stream>:[pos20, ∞)`, resolving each entry's message.
/// A stream with no entries yields an empty list, not an error.
pub fn scan(kv: &dyn KvStore, stream: &str, opts: StreamScanOptions) -> Result<Vec<Message>> {
    let limit = effective_batch_size(opts.batch_size);
    let start = keycodec::stream_index_key(stream, opts.start_position);
    let prefix = keycodec::stream_index_prefix(stream);
    let upper = keycodec::prefix_successor(&prefix);

    let mut out = Vec::new();
    for (_, value) in kv.scan(&start, &upper)? {
        if let BatchLimit::Limited(n) = limit {
            if out.len() >= n {
                break;
            }
        }
        let global_position = keycodec::decode_position(&value)?;
        if let Some(filter) = opts.global_position_filter {
            if global_position < filter {
                continue;
            }
        }
        out.push(load_message(kv, global_position)?);
    }
    Ok(out)
}

/// Reads `VI:<stream>` with no type filter, or scans `SI:<stream>:*` in
/// reverse looking for the most recent message of the given type.
/// `STREAM_NOT_FOUND` if the stream doesn't exist, or (with a type filter)
/// if no message of that type exists.
pub fn last_of_type(kv: &dyn KvStore, stream: &str, event_type: Option<&str>) -> Result<Message> {
    match event_type {
        None => {
            let version_bytes = kv
                .get(&keycodec::version_key(stream))?
                .ok_or_else(|| Error::StreamNotFound(stream.to_string()))?;
            let version = keycodec::decode_position(&version_bytes)?;
            let gp_bytes = kv
                .get(&keycodec::stream_index_key(stream, version))?
                .ok_or_else(|| Error::decode("dangling VI entry: SI key missing"))?;
            let global_position = keycodec::decode_position(&gp_bytes)?;
            load_message(kv, global_position)
        }
        Some(event_type) => {
            let prefix = keycodec::stream_index_prefix(stream);
            let upper = keycodec::prefix_successor(&prefix);
            for (_, value) in kv.scan_rev(&prefix, &upper)? {
                let global_position = keycodec::decode_position(&value)?;
                let message = load_message(kv, global_position)?;
                if message.event_type == event_type {
                    return Ok(message);
                }
            }
            Err(Error::StreamNotFound(stream.to_string()))
        }
    }
}

/// Reads `VI:<stream>`; `-1` (not an error) if the stream doesn't exist.
pub fn version(kv: &dyn KvStore, stream: &str) -> Result<i64> {
    match kv.get(&keycodec::version_key(stream))? {
        Some(bytes) => Ok(keycodec::decode_position(&bytes)? as i64),
        None => Ok(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::RedbStore;
    use crate::payload;
    use chrono::Utc;
    use serde_json::json;

    fn put_message(kv: &dyn KvStore, stream: &str, position: u64, global_position: u64, event_type: &str) {
        let message = Message {
            id: format!("id-{global_position}"),
            stream_name: stream.to_string(),
            event_type: event_type.to_string(),
            position,
            global_position,
            data: json!({}),
            metadata: None,
            time: Utc::now(),
        };
        let encoded = payload::encode(&message, false).unwrap();
        kv.write_batch(vec![
            (keycodec::message_key(global_position), encoded),
            (
                keycodec::stream_index_key(stream, position),
                keycodec::encode_position(global_position),
            ),
            (
                keycodec::version_key(stream),
                keycodec::encode_position(position),
            ),
        ])
        .unwrap();
    }

    #[test]
    fn missing_stream_scan_is_empty_not_error() {
        let kv = RedbStore::open_in_memory().unwrap();
        let result = scan(&kv, "nope", StreamScanOptions::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn scan_respects_start_position_and_batch_size() {
        let kv = RedbStore::open_in_memory().unwrap();
        for i in 0..5 {
            put_message(&kv, "account-1", i, i + 1, "Event");
        }
        let opts = StreamScanOptions {
            start_position: 2,
            batch_size: Some(2),
            ..Default::default()
        };
        let result = scan(&kv, "account-1", opts).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].position, 2);
        assert_eq!(result[1].position, 3);
    }

    #[test]
    fn version_probe_minus_one_when_absent() {
        let kv = RedbStore::open_in_memory().unwrap();
        assert_eq!(version(&kv, "nope").unwrap(), -1);
        put_message(&kv, "account-1", 0, 1, "Event");
        assert_eq!(version(&kv, "account-1").unwrap(), 0);
    }

    #[test]
    fn last_of_type_without_filter() {
        let kv = RedbStore::open_in_memory().unwrap();
        put_message(&kv, "account-1", 0, 1, "Opened");
        put_message(&kv, "account-1", 1, 2, "Deposited");
        let last = last_of_type(&kv, "account-1", None).unwrap();
        assert_eq!(last.event_type, "Deposited");
    }

    #[test]
    fn last_of_type_with_filter_scans_in_reverse() {
        let kv = RedbStore::open_in_memory().unwrap();
        put_message(&kv, "account-1", 0, 1, "Opened");
        put_message(&kv, "account-1", 1, 2, "Deposited");
        put_message(&kv, "account-1", 2, 3, "Deposited");
        let last = last_of_type(&kv, "account-1", Some("Opened")).unwrap();
        assert_eq!(last.position, 0);

        assert!(matches!(
            last_of_type(&kv, "account-1", Some("Withdrawn")),
            Err(Error::StreamNotFound(_))
        ));
    }
}
