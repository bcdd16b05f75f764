//! Namespace store manager: keeps a cache of open per-namespace key-value
//! store handles, lazily opened on first access and closed on namespace
//! deletion or manager shutdown.
//!
//! Follows the lazy-open-and-cache shape of this codebase's namespace
//! manager, generalized from an object-store-backed manifest cache to an
//! embedded-KV-backed one, with the write mutex moved onto each handle so
//! commits to a given namespace are strictly serialized.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::kv::{KvStore, RedbStore};
use crate::registry::NamespaceRegistry;
use crate::types::Namespace;

/// An open per-namespace store plus the write mutex that serializes every
/// commit to it.
pub struct NamespaceHandle {
    pub kv: Arc<dyn KvStore>,
    pub write_lock: Mutex<()>,
}

enum Backing {
    OnDisk { root: PathBuf, durability: redb::Durability },
    InMemory,
}

pub struct NamespaceStoreManager {
    registry: NamespaceRegistry,
    handles: RwLock<HashMap<String, Arc<NamespaceHandle>>>,
    backing: Backing,
}

impl NamespaceStoreManager {
    /// Opens (creating if absent) the registry and namespace directories
    /// under `data_dir`. Per-namespace stores commit with the configured
    /// `durability` mode; the registry itself always syncs regardless
    /// (see [`NamespaceRegistry::open_on_disk`]).
    pub fn open_on_disk(data_dir: PathBuf, durability: redb::Durability) -> Result<Self> {
        let registry = NamespaceRegistry::open_on_disk(&data_dir.join("_metadata"))?;
        Ok(Self {
            registry,
            handles: RwLock::new(HashMap::new()),
            backing: Backing::OnDisk { root: data_dir, durability },
        })
    }

    /// Opens a manager with no on-disk footprint at all (the `in-memory`
    /// durability mode).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            registry: NamespaceRegistry::open_in_memory()?,
            handles: RwLock::new(HashMap::new()),
            backing: Backing::InMemory,
        })
    }

    /// Opens a manager per the configured durability mode: `in-memory`
    /// skips disk entirely, `production`/`test` both open on-disk stores
    /// under `data_dir` differing only in commit sync behavior.
    pub fn open(data_dir: PathBuf, durability: crate::config::Durability) -> Result<Self> {
        if durability.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open_on_disk(data_dir, durability.redb_durability())
        }
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    fn namespace_dir(&self, id: &str) -> Option<PathBuf> {
        match &self.backing {
            Backing::OnDisk { root, .. } => Some(root.join(id)),
            Backing::InMemory => None,
        }
    }

    /// Registers a new namespace and allocates its storage area. The store
    /// handle itself is opened lazily on first access (see
    /// [`NamespaceStoreManager::handle`]).
    pub async fn create_namespace(
        &self,
        id: &str,
        credential_hash: &str,
        description: String,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Namespace> {
        let _guard = self.handles.write().await;
        let namespace = self.registry.create(id, credential_hash, description, metadata)?;
        if let Some(dir) = self.namespace_dir(id) {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(namespace)
    }

    /// Resolves the open handle for `id`, opening and caching it on first
    /// use. Fails `NAMESPACE_NOT_FOUND` if the namespace was never created.
    pub async fn handle(&self, id: &str) -> Result<Arc<NamespaceHandle>> {
        {
            let handles = self.handles.read().await;
            if let Some(handle) = handles.get(id) {
                return Ok(handle.clone());
            }
        }

        let mut handles = self.handles.write().await;
        if let Some(handle) = handles.get(id) {
            return Ok(handle.clone());
        }
        if self.registry.get(id)?.is_none() {
            return Err(Error::NamespaceNotFound(id.to_string()));
        }

        let kv: Arc<dyn KvStore> = match &self.backing {
            Backing::OnDisk { root, durability } => {
                let dir = root.join(id);
                std::fs::create_dir_all(&dir)?;
                Arc::new(RedbStore::open(&dir.join("store.redb"), *durability)?)
            }
            Backing::InMemory => Arc::new(RedbStore::open_in_memory()?),
        };
        let handle = Arc::new(NamespaceHandle {
            kv,
            write_lock: Mutex::new(()),
        });
        handles.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Closes the cached handle (if any), removes the metadata row, and
    /// destroys the storage area. Fails `NAMESPACE_NOT_FOUND` if absent.
    pub async fn delete_namespace(&self, id: &str) -> Result<Namespace> {
        let mut handles = self.handles.write().await;
        let namespace = self.registry.delete(id)?;
        handles.remove(id);
        if let Some(dir) = self.namespace_dir(id) {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        Ok(namespace)
    }

    /// Closes every cached handle. Registry state is left intact on disk.
    pub async fn close(&self) {
        self.handles.write().await.clear();
    }
}
