use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use codex_common::{Error, ErrorKind, Generation, ItemKey, Result as CodexResult};

use crate::images::CacheKey;
use crate::library::ArtworkRef;
use crate::metadata::{MetadataRecord, SeasonRecord};
use crate::reconcile::SweepReport;

/// One unit of scheduled work.
///
/// Each variant carries only what it needs to run; jobs never see the
/// library tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchJob {
    MovieLookup {
        key: ItemKey,
        title: String,
        year: Option<u16>,
    },
    ShowLookup {
        key: ItemKey,
        title: String,
    },
    /// Submitted only once the show's remote id is known.
    SeasonLookup {
        show_key: ItemKey,
        season_key: ItemKey,
        show_id: u64,
        season_number: u32,
    },
    ImageDownload {
        reference: ArtworkRef,
    },
    CacheSweep {
        live_keys: HashSet<CacheKey>,
    },
}

impl FetchJob {
    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MovieLookup { .. } => "movie_lookup",
            Self::ShowLookup { .. } => "show_lookup",
            Self::SeasonLookup { .. } => "season_lookup",
            Self::ImageDownload { .. } => "image_download",
            Self::CacheSweep { .. } => "cache_sweep",
        }
    }

    /// Whether the job counts toward a pass's outstanding lookups.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::MovieLookup { .. } | Self::ShowLookup { .. } | Self::SeasonLookup { .. }
        )
    }

    /// The outcome posted when the job could not run to completion.
    pub fn failed(self, kind: ErrorKind) -> JobOutcome {
        match self {
            Self::MovieLookup { key, .. } => JobOutcome::Movie {
                key,
                result: Err(kind),
            },
            Self::ShowLookup { key, .. } => JobOutcome::Show {
                key,
                result: Err(kind),
            },
            Self::SeasonLookup {
                show_key,
                season_key,
                ..
            } => JobOutcome::Season {
                show_key,
                season_key,
                result: Err(kind),
            },
            Self::ImageDownload { reference } => JobOutcome::Image {
                reference,
                result: Err(kind),
            },
            Self::CacheSweep { .. } => JobOutcome::Sweep { result: Err(kind) },
        }
    }
}

/// A job tagged with the pass that submitted it.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub generation: Generation,
    pub job: FetchJob,
}

/// The generation the coordinator is enriching, shared with the workers.
///
/// Only the coordinator advances it. Workers consult it before doing work
/// that must not outlive its pass.
#[derive(Debug, Clone, Default)]
pub struct CurrentGeneration(Arc<AtomicU64>);

impl CurrentGeneration {
    pub fn get(&self) -> Generation {
        Generation::from(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, generation: Generation) {
        self.0.store(generation.get(), Ordering::SeqCst);
    }

    /// `Err(StaleResult)` once `generation` has been superseded.
    pub fn check(&self, generation: Generation) -> CodexResult<()> {
        let current = self.get();
        if current == generation {
            Ok(())
        } else {
            Err(Error::StaleResult {
                expected: current.get(),
                actual: generation.get(),
            })
        }
    }
}

/// Where downloaded bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Cache,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub bytes: Bytes,
    pub source: ImageSource,
}

/// Result payload, tagged by the job variant that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Movie {
        key: ItemKey,
        result: Result<Option<MetadataRecord>, ErrorKind>,
    },
    Show {
        key: ItemKey,
        result: Result<Option<MetadataRecord>, ErrorKind>,
    },
    Season {
        show_key: ItemKey,
        season_key: ItemKey,
        result: Result<Option<SeasonRecord>, ErrorKind>,
    },
    Image {
        reference: ArtworkRef,
        result: Result<Downloaded, ErrorKind>,
    },
    Sweep {
        result: Result<SweepReport, ErrorKind>,
    },
}

impl JobOutcome {
    /// Mirrors [`FetchJob::is_lookup`].
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::Movie { .. } | Self::Show { .. } | Self::Season { .. }
        )
    }
}

/// Posted exactly once per scheduled job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub generation: Generation,
    pub outcome: JobOutcome,
}
