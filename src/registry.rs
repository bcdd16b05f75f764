//! Namespace registry: the catalog of tenants, their credential hashes,
//! and descriptions, persisted in a dedicated metadata store separate
//! from every tenant's own data.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::keycodec;
use crate::kv::{KvStore, RedbStore};
use crate::types::Namespace;

pub struct NamespaceRegistry {
    store: Arc<dyn KvStore>,
}

impl NamespaceRegistry {
    /// Opens the registry's backing store. Always commits with
    /// `redb::Durability::Immediate` regardless of the configured storage
    /// durability mode: namespace metadata is small and rare enough that
    /// there's no throughput reason to relax it, and `ns.create` must
    /// persist synchronously.
    pub fn open_on_disk(metadata_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(metadata_dir)?;
        let store = RedbStore::open(&metadata_dir.join("registry.redb"), redb::Durability::Immediate)?;
        Ok(Self { store: Arc::new(store) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { store: Arc::new(RedbStore::open_in_memory()?) })
    }

    /// Creates a new namespace record. Fails with `NAMESPACE_EXISTS` if the
    /// id is taken, or a validation error on an empty id/credential hash.
    pub fn create(
        &self,
        id: &str,
        credential_hash: &str,
        description: String,
        metadata: HashMap<String, Value>,
    ) -> Result<Namespace> {
        if id.is_empty() {
            return Err(Error::invalid_request("namespace id must not be empty"));
        }
        if credential_hash.is_empty() {
            return Err(Error::invalid_request("credential hash must not be empty"));
        }
        if self.get(id)?.is_some() {
            return Err(Error::NamespaceExists(id.to_string()));
        }

        let namespace = Namespace {
            id: id.to_string(),
            credential_hash: credential_hash.to_string(),
            description,
            created_at: Utc::now(),
            metadata,
        };
        self.persist(&namespace)?;
        Ok(namespace)
    }

    fn persist(&self, namespace: &Namespace) -> Result<()> {
        let key = keycodec::registry_key(&namespace.id);
        let value = serde_json::to_vec(namespace)?;
        self.store.write_batch(vec![(key, value)])
    }

    /// Looks up a namespace record by id. `None` if absent — callers that
    /// require the namespace to exist map this to `NAMESPACE_NOT_FOUND`.
    pub fn get(&self, id: &str) -> Result<Option<Namespace>> {
        match self.store.get(&keycodec::registry_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Enumerates every registered namespace via a prefix scan, ordered by id.
    pub fn list(&self) -> Result<Vec<Namespace>> {
        let prefix = keycodec::registry_prefix();
        let upper = keycodec::prefix_successor(&prefix);
        let entries = self.store.scan(&prefix, &upper)?;
        entries
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(Error::from))
            .collect()
    }

    /// Removes a namespace's metadata row. Fails `NAMESPACE_NOT_FOUND` if
    /// absent. Tearing down the tenant's storage area and any cached store
    /// handle is the store manager's responsibility.
    pub fn delete(&self, id: &str) -> Result<Namespace> {
        let namespace = self
            .get(id)?
            .ok_or_else(|| Error::NamespaceNotFound(id.to_string()))?;
        self.store.delete_batch(vec![keycodec::registry_key(id)])?;
        Ok(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get() {
        let registry = NamespaceRegistry::open_in_memory().unwrap();
        let ns = registry
            .create("tenant-a", "hash123", "first tenant".to_string(), HashMap::new())
            .unwrap();
        let fetched = registry.get("tenant-a").unwrap().unwrap();
        assert_eq!(fetched.id, ns.id);
        assert_eq!(fetched.credential_hash, "hash123");
    }

    #[test]
    fn create_rejects_duplicates_and_empty_fields() {
        let registry = NamespaceRegistry::open_in_memory().unwrap();
        registry
            .create("tenant-a", "hash", String::new(), HashMap::new())
            .unwrap();
        assert!(matches!(
            registry.create("tenant-a", "hash", String::new(), HashMap::new()),
            Err(Error::NamespaceExists(_))
        ));
        assert!(registry.create("", "hash", String::new(), HashMap::new()).is_err());
        assert!(registry.create("tenant-b", "", String::new(), HashMap::new()).is_err());
    }

    #[test]
    fn list_enumerates_all() {
        let registry = NamespaceRegistry::open_in_memory().unwrap();
        registry.create("b", "h", String::new(), HashMap::new()).unwrap();
        registry.create("a", "h", String::new(), HashMap::new()).unwrap();
        let ids: Vec<_> = registry.list().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn delete_removes_record_and_fails_on_missing() {
        let registry = NamespaceRegistry::open_in_memory().unwrap();
        registry.create("tenant-a", "hash", String::new(), HashMap::new()).unwrap();
        registry.delete("tenant-a").unwrap();
        assert!(registry.get("tenant-a").unwrap().is_none());
        assert!(matches!(
            registry.delete("tenant-a"),
            Err(Error::NamespaceNotFound(_))
        ));
    }
}
