//! Embedded ordered key-value store abstraction backing every per-namespace
//! index and the namespace registry.
//!
//! There is a single backend, [`RedbStore`], opened either on disk or
//! in-memory depending on the configured durability mode. Reads and
//! writes are synchronous — redb is a memory-mapped B-tree, so calls are
//! fast and the async layers above call through directly rather than
//! wrapping every call in `spawn_blocking`.

mod redb_store;

pub use redb_store::RedbStore;

use crate::error::Result;

/// One atomically-applied write: a list of key/value upserts.
pub type Batch = Vec<(Vec<u8>, Vec<u8>)>;

/// An ordered byte-key store with range scans and atomic batch writes.
pub trait KvStore: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Ascending scan over `[start, end_exclusive)`.
    fn scan(&self, start: &[u8], end_exclusive: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Descending scan over `[start, end_exclusive)`, i.e. the same range
    /// as [`KvStore::scan`] but yielded from the highest key down.
    fn scan_rev(&self, start: &[u8], end_exclusive: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Applies every entry in `batch` in a single atomic transaction.
    fn write_batch(&self, batch: Batch) -> Result<()>;

    /// Removes every key in `keys` in a single atomic transaction. Used only
    /// by the namespace registry (the per-namespace log itself is append-only
    /// and never deletes individual keys).
    fn delete_batch(&self, keys: Vec<Vec<u8>>) -> Result<()>;
}
