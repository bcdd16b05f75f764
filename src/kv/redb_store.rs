//! `redb`-backed implementation of [`super::KvStore`].
//!
//! Grounded on the embedded key-value backend pattern used for persistence
//! elsewhere in this codebase's dependency stack: one table, opened once at
//! construction, `begin_read`/`begin_write` transactions per operation, and
//! `range()` for ordered scans.

use std::path::Path;

use redb::{Database, Durability, ReadableTable, TableDefinition};

use super::{Batch, KvStore};
use crate::error::{Error, Result};

const KV_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

pub struct RedbStore {
    db: Database,
    durability: Durability,
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::storage(e.to_string())
}

impl RedbStore {
    /// Opens (creating if absent) an on-disk store at `path`, committing
    /// writes with `durability`.
    pub fn open(path: &Path, durability: Durability) -> Result<Self> {
        let db = Database::create(path)
            .map_err(|e| Error::storage(format!("failed to open store at {}: {e}", path.display())))?;
        Self::ensure_table(&db)?;
        Ok(Self { db, durability })
    }

    /// Opens a store backed purely by memory, for the `in-memory` durability
    /// mode and for tests that don't need to touch disk.
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(store_err)?;
        Self::ensure_table(&db)?;
        Ok(Self { db, durability: Durability::Eventual })
    }

    fn ensure_table(db: &Database) -> Result<()> {
        let txn = db.begin_write().map_err(store_err)?;
        txn.open_table(KV_TABLE).map_err(store_err)?;
        txn.commit().map_err(store_err)?;
        Ok(())
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let table = txn.open_table(KV_TABLE).map_err(store_err)?;
        match table.get(key).map_err(store_err)? {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }

    fn scan(&self, start: &[u8], end_exclusive: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let table = txn.open_table(KV_TABLE).map_err(store_err)?;
        let range = table.range(start..end_exclusive).map_err(store_err)?;
        let mut out = Vec::new();
        for item in range {
            let (k, v) = item.map_err(store_err)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }

    fn scan_rev(&self, start: &[u8], end_exclusive: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let table = txn.open_table(KV_TABLE).map_err(store_err)?;
        let range = table.range(start..end_exclusive).map_err(store_err)?;
        let mut out = Vec::new();
        for item in range.rev() {
            let (k, v) = item.map_err(store_err)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }

    fn write_batch(&self, batch: Batch) -> Result<()> {
        let mut txn = self.db.begin_write().map_err(store_err)?;
        txn.set_durability(self.durability);
        {
            let mut table = txn.open_table(KV_TABLE).map_err(store_err)?;
            for (key, value) in &batch {
                table.insert(key.as_slice(), value.as_slice()).map_err(store_err)?;
            }
        }
        txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn delete_batch(&self, keys: Vec<Vec<u8>>) -> Result<()> {
        let mut txn = self.db.begin_write().map_err(store_err)?;
        txn.set_durability(self.durability);
        {
            let mut table = txn.open_table(KV_TABLE).map_err(store_err)?;
            for key in &keys {
                table.remove(key.as_slice()).map_err(store_err)?;
            }
        }
        txn.commit().map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .write_batch(vec![(b"a".to_vec(), b"1".to_vec())])
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn scan_respects_ascending_order() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .write_batch(vec![
                (b"k:1".to_vec(), b"a".to_vec()),
                (b"k:2".to_vec(), b"b".to_vec()),
                (b"k:3".to_vec(), b"c".to_vec()),
            ])
            .unwrap();
        let got = store.scan(b"k:", b"k;").unwrap();
        assert_eq!(
            got,
            vec![
                (b"k:1".to_vec(), b"a".to_vec()),
                (b"k:2".to_vec(), b"b".to_vec()),
                (b"k:3".to_vec(), b"c".to_vec()),
            ]
        );
        let rev = store.scan_rev(b"k:", b"k;").unwrap();
        assert_eq!(
            rev,
            vec![
                (b"k:3".to_vec(), b"c".to_vec()),
                (b"k:2".to_vec(), b"b".to_vec()),
                (b"k:1".to_vec(), b"a".to_vec()),
            ]
        );
    }

    #[test]
    fn write_batch_is_atomic_within_one_transaction() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .write_batch(vec![
                (b"x".to_vec(), b"1".to_vec()),
                (b"y".to_vec(), b"2".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.get(b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"y").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.redb");
        {
            let store = RedbStore::open(&path, Durability::Immediate).unwrap();
            store
                .write_batch(vec![(b"a".to_vec(), b"1".to_vec())])
                .unwrap();
        }
        let reopened = RedbStore::open(&path, Durability::Immediate).unwrap();
        assert_eq!(reopened.get(b"a").unwrap(), Some(b"1".to_vec()));
    }
}
