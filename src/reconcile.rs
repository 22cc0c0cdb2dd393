//! Cache reconciliation: mark the artwork still reachable from the library,
//! sweep everything else out of the cache directory.
//!
//! One generation at a time. The sweep runs after a pass has reached
//! `Ready`, when the previous generation's tree has already been replaced.

use std::collections::HashSet;
use std::sync::Arc;

use codex_common::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::images::{derive_key, AssetCache, CacheKey};
use crate::library::Library;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries found on disk.
    pub scanned: usize,
    /// Entries still referenced.
    pub kept: usize,
    pub evicted: usize,
    /// Evictions that failed; the files stay until the next sweep.
    pub failed: usize,
}

/// Cache keys of every artwork reference reachable from the tree.
pub fn live_keys(library: &Library) -> HashSet<CacheKey> {
    library
        .items()
        .filter_map(|item| item.artwork())
        .map(derive_key)
        .collect()
}

/// Sweeps one cache against a live key set.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cache: Arc<AssetCache>,
}

impl Reconciler {
    pub fn new(cache: Arc<AssetCache>) -> Self {
        Self { cache }
    }

    /// Evict every cached entry whose key is not in `live`.
    ///
    /// `still_current` is asked before the directory is listed and before
    /// each eviction. Once it fails the sweep stops and returns that error;
    /// entries already evicted stay evicted. Listing the directory is the
    /// only other fatal step; individual eviction failures are logged and
    /// counted.
    pub fn sweep(
        &self,
        live: &HashSet<CacheKey>,
        still_current: impl Fn() -> Result<()>,
    ) -> Result<SweepReport> {
        still_current()?;
        let on_disk = self.cache.list_keys()?;
        let mut report = SweepReport {
            scanned: on_disk.len(),
            ..SweepReport::default()
        };

        for key in on_disk {
            if live.contains(&key) {
                report.kept += 1;
                continue;
            }
            if let Err(e) = still_current() {
                info!(evicted = report.evicted, "Cache sweep superseded, stopping");
                return Err(e);
            }
            match self.cache.evict(&key) {
                Ok(()) => report.evicted += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to evict cache entry");
                    report.failed += 1;
                }
            }
        }

        info!(
            dir = %self.cache.dir().display(),
            scanned = report.scanned,
            kept = report.kept,
            evicted = report.evicted,
            failed = report.failed,
            "Cache sweep complete"
        );
        Ok(report)
    }
}
