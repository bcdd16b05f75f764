//! Stream listing and category listing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::load_message;
use crate::error::{Error, Result};
use crate::keycodec;
use crate::kv::KvStore;
use crate::types::stream_category;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct StreamListingOptions {
    pub prefix: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamListingEntry {
    pub stream: String,
    pub version: u64,
    pub last_activity: DateTime<Utc>,
}

/// Iterates `VI:` keys (already in ascending stream-name order), applying
/// an optional prefix filter and an exclusive cursor lower bound.
pub fn list_streams(kv: &dyn KvStore, opts: StreamListingOptions) -> Result<Vec<StreamListingEntry>> {
    let limit = opts.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let prefix = keycodec::version_prefix();
    let upper = keycodec::prefix_successor(&prefix);

    let mut out = Vec::new();
    for (key, value) in kv.scan(&prefix, &upper)? {
        let stream = keycodec::parse_version_key(&key)
            .ok_or_else(|| Error::decode("malformed VI key"))?;

        if let Some(p) = &opts.prefix {
            if !stream.starts_with(p.as_str()) {
                continue;
            }
        }
        if let Some(cursor) = &opts.cursor {
            if stream <= cursor.as_str() {
                continue;
            }
        }

        let version = keycodec::decode_position(&value)?;
        let gp_bytes = kv
            .get(&keycodec::stream_index_key(stream, version))?
            .ok_or_else(|| Error::decode("dangling VI entry: SI key missing"))?;
        let global_position = keycodec::decode_position(&gp_bytes)?;
        let message = load_message(kv, global_position)?;

        out.push(StreamListingEntry {
            stream: stream.to_string(),
            version,
            last_activity: message.time,
        });
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryListingEntry {
    pub category: String,
    pub stream_count: usize,
    pub message_count: usize,
}

/// Two-pass listing: accumulate streams per category from `VI:`, then count
/// `CI:<category>:*` entries for each. `BTreeMap`/`BTreeSet` give the
/// "sorted by category name" ordering for free.
pub fn list_categories(kv: &dyn KvStore) -> Result<Vec<CategoryListingEntry>> {
    let vi_prefix = keycodec::version_prefix();
    let vi_upper = keycodec::prefix_successor(&vi_prefix);

    let mut streams_by_category: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (key, _) in kv.scan(&vi_prefix, &vi_upper)? {
        let stream = keycodec::parse_version_key(&key)
            .ok_or_else(|| Error::decode("malformed VI key"))?;
        streams_by_category
            .entry(stream_category(stream).to_string())
            .or_default()
            .insert(stream.to_string());
    }

    let mut out = Vec::with_capacity(streams_by_category.len());
    for (category, streams) in streams_by_category {
        let ci_prefix = keycodec::category_index_prefix(&category);
        let ci_upper = keycodec::prefix_successor(&ci_prefix);
        let message_count = kv.scan(&ci_prefix, &ci_upper)?.len();
        out.push(CategoryListingEntry {
            category,
            stream_count: streams.len(),
            message_count,
        });
    }
    Ok(out)
}
