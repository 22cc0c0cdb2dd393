//! Filesystem-level artwork storage.
//!
//! Files live directly under the cache directory, named by their
//! [`CacheKey`]. Writes go to a hidden temp file in the same directory and
//! are renamed into place, so a reader sees either the previous file or the
//! complete new one.

use std::collections::HashSet;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use codex_common::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::library::ArtworkRef;

/// Hex length of a SHA-256 digest.
const KEY_LEN: usize = 64;

/// Prefix for in-progress writes; never a valid key.
const TEMP_PREFIX: &str = ".partial-";

/// Deterministic on-disk name for an artwork reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Accept a filename only if it has the shape of a derived key.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let valid = name.len() == KEY_LEN
            && name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a reference. Pure; no I/O.
pub fn derive_key(reference: &ArtworkRef) -> CacheKey {
    let digest = Sha256::digest(reference.as_str().as_bytes());
    CacheKey(hex::encode(digest))
}

/// Plain file store rooted at one directory, created lazily.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Read the file for `key`. A missing or empty file is `Ok(None)`.
    pub fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Atomically write `bytes` for `key`, replacing any existing file.
    pub fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::invalid_input("refusing to cache an empty image"));
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(self.path_for(key)).map_err(|e| Error::Io(e.error))?;

        debug!(key = %key, bytes = bytes.len(), "Wrote cache entry");
        Ok(())
    }

    /// Every key currently on disk. A missing directory is an empty set.
    ///
    /// Files whose names are not derived keys (temp files, strays) are skipped.
    pub fn list_keys(&self) -> Result<HashSet<CacheKey>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut keys = HashSet::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, dir = %self.dir.display(), "Failed to read cache entry");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(CacheKey::from_file_name) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }

    /// Delete the file for `key`. Deleting a missing file succeeds.
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
