//! Query engines: stream scan, category scan, last-of-type, version
//! probe, and the stream/category listings, plus the consumer-group
//! partitioner and correlation filter shared by category scans.

pub mod category;
pub mod correlation;
pub mod listing;
pub mod partition;
pub mod stream;

pub use category::{scan as category_scan, CategoryScanOptions};
pub use listing::{list_categories, list_streams, CategoryListingEntry, StreamListingEntry, StreamListingOptions};
pub use partition::ConsumerGroup;
pub use stream::{last_of_type, scan as stream_scan, version, StreamScanOptions};

use crate::error::{Error, Result};
use crate::keycodec;
use crate::kv::KvStore;
use crate::payload;
use crate::types::Message;

/// Default `batch_size` when none (or `0`, treated as unspecified) is
/// supplied.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A resolved scan limit: either a finite count or "return everything".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLimit {
    Limited(usize),
    Unlimited,
}

/// Resolves a raw `batch_size` argument: `None`/`Some(0)` → default,
/// `Some(-1)` → unlimited, any other positive value used as-is. Other
/// negative values fall back to the default rather than underflowing.
pub fn effective_batch_size(requested: Option<i64>) -> BatchLimit {
    match requested {
        None | Some(0) => BatchLimit::Limited(DEFAULT_BATCH_SIZE),
        Some(-1) => BatchLimit::Unlimited,
        Some(n) if n > 0 => BatchLimit::Limited(n as usize),
        Some(_) => BatchLimit::Limited(DEFAULT_BATCH_SIZE),
    }
}

/// Reads and decodes the message at `global_position`. A missing `M:` entry
/// for a gp an index points at is a decoding-class error (dangling index),
/// never a not-found: it indicates store corruption, not a valid miss.
pub(crate) fn load_message(kv: &dyn KvStore, global_position: u64) -> Result<Message> {
    let bytes = kv
        .get(&keycodec::message_key(global_position))?
        .ok_or_else(|| {
            Error::decode(format!(
                "dangling index entry: message gp={global_position} missing from primary store"
            ))
        })?;
    payload::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_boundaries() {
        assert_eq!(effective_batch_size(None), BatchLimit::Limited(DEFAULT_BATCH_SIZE));
        assert_eq!(effective_batch_size(Some(0)), BatchLimit::Limited(DEFAULT_BATCH_SIZE));
        assert_eq!(effective_batch_size(Some(-1)), BatchLimit::Unlimited);
        assert_eq!(effective_batch_size(Some(5)), BatchLimit::Limited(5));
    }
}
