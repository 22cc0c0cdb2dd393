use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use codex_common::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::storage::{derive_key, CacheKey, DiskStore};
use crate::library::ArtworkRef;

/// Content-addressed artwork cache: an optional memory layer over a
/// [`DiskStore`].
///
/// All methods are synchronous and may touch the filesystem; async callers
/// run them on a blocking thread. The memory layer is safe to consult from
/// any thread.
#[derive(Debug)]
pub struct AssetCache {
    disk: DiskStore,
    memory: Option<RwLock<HashMap<CacheKey, Bytes>>>,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>, memory_layer: bool) -> Self {
        Self {
            disk: DiskStore::new(dir),
            memory: memory_layer.then(|| RwLock::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        self.disk.dir()
    }

    /// Look up an image, memory first, then disk.
    ///
    /// Only non-empty data counts as a hit. Disk errors other than a missing
    /// file are logged and reported as a miss.
    pub fn read(&self, reference: &ArtworkRef) -> Option<Bytes> {
        let key = derive_key(reference);
        if let Some(bytes) = self.memory_get(&key) {
            return Some(bytes);
        }

        match self.disk.read(&key) {
            Ok(Some(data)) => {
                let bytes = Bytes::from(data);
                self.memory_put(key, bytes.clone());
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(reference = %reference, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Memory-layer lookup only; never touches disk.
    pub fn cached(&self, reference: &ArtworkRef) -> Option<Bytes> {
        self.memory_get(&derive_key(reference))
    }

    /// Store an image under the key derived from `reference`.
    pub fn write(&self, reference: &ArtworkRef, bytes: &[u8]) -> Result<()> {
        let key = derive_key(reference);
        self.disk.write(&key, bytes)?;
        self.memory_put(key, Bytes::copy_from_slice(bytes));
        Ok(())
    }

    /// Keys of every entry currently on disk.
    pub fn list_keys(&self) -> Result<HashSet<CacheKey>> {
        self.disk.list_keys()
    }

    /// Remove an entry from disk and memory. Missing entries are not an error.
    pub fn evict(&self, key: &CacheKey) -> Result<()> {
        if let Some(memory) = &self.memory {
            memory.write().remove(key);
        }
        self.disk.remove(key)?;
        debug!(key = %key, "Evicted cache entry");
        Ok(())
    }

    fn memory_get(&self, key: &CacheKey) -> Option<Bytes> {
        self.memory.as_ref()?.read().get(key).cloned()
    }

    fn memory_put(&self, key: CacheKey, bytes: Bytes) {
        if let Some(memory) = &self.memory {
            memory.write().insert(key, bytes);
        }
    }
}
