//! Category scan: across-streams scan ordered by global position, with an
//! optional consumer-group partition and correlation filter applied
//! inline without re-reading the message body for the consumer-group case
//! (the `CI:` value already carries the stream name).

use super::{correlation, effective_batch_size, load_message, BatchLimit, ConsumerGroup};
use crate::error::Result;
use crate::keycodec;
use crate::kv::KvStore;
use crate::types::Message;

#[derive(Debug, Clone, Default)]
pub struct CategoryScanOptions {
    pub start_global_position: u64,
    pub batch_size: Option<i64>,
    pub consumer_group: Option<ConsumerGroup>,
    pub correlation: Option<String>,
}

/// Scans `category` (or, if empty, every message in the namespace ordered
/// by global position) starting at `start_global_position`.
///
/// When a consumer group is set, the scan-ahead limit is `batch_size *
/// size` keys rather than `batch_size` matches, so a single member doesn't
/// stall waiting on keys that belong to other members. Without a consumer
/// group, scanning is unbounded and stops only once `batch_size` matches
/// have been collected, so a correlation filter doesn't starve results
/// out of a category with many non-matching entries.
pub fn scan(kv: &dyn KvStore, category: &str, opts: CategoryScanOptions) -> Result<Vec<Message>> {
    let limit = effective_batch_size(opts.batch_size);
    let scan_ahead_limit = match (limit, &opts.consumer_group) {
        (BatchLimit::Limited(n), Some(group)) => Some(n.saturating_mul(group.size as usize)),
        (BatchLimit::Limited(_), None) => None,
        (BatchLimit::Unlimited, _) => None,
    };

    let mut out = Vec::new();
    let mut scanned = 0usize;

    if category.is_empty() {
        let start = keycodec::message_key_lower_bound(opts.start_global_position);
        let upper = keycodec::message_prefix_upper();
        for (_, value) in kv.scan(&start, &upper)? {
            if let Some(cap) = scan_ahead_limit {
                if scanned >= cap {
                    break;
                }
            }
            scanned += 1;

            let message = crate::payload::decode(&value)?;
            if !correlation::matches(&message, opts.correlation.as_deref()) {
                continue;
            }
            out.push(message);
            if let BatchLimit::Limited(n) = limit {
                if out.len() >= n {
                    break;
                }
            }
        }
    } else {
        let start = keycodec::category_index_key_lower_bound(category, opts.start_global_position);
        let prefix = keycodec::category_index_prefix(category);
        let upper = keycodec::prefix_successor(&prefix);
        for (key, value) in kv.scan(&start, &upper)? {
            if let Some(cap) = scan_ahead_limit {
                if scanned >= cap {
                    break;
                }
            }
            scanned += 1;

            if let Some(group) = &opts.consumer_group {
                let stream_name = std::str::from_utf8(&value)
                    .map_err(|_| crate::error::Error::decode("non-utf8 stream name in CI value"))?;
                if !group.admits(stream_name) {
                    continue;
                }
            }

            let global_position = keycodec::parse_trailing_int(&key)?;
            let message = load_message(kv, global_position)?;
            if !correlation::matches(&message, opts.correlation.as_deref()) {
                continue;
            }
            out.push(message);
            if let BatchLimit::Limited(n) = limit {
                if out.len() >= n {
                    break;
                }
            }
        }
    }

    Ok(out)
}
