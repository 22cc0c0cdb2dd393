//! Notifications for the presentation layer.

use std::sync::Arc;

use bytes::Bytes;
use codex_common::Generation;
use tokio::sync::{broadcast, watch};

use crate::library::{ArtworkRef, Library};
use crate::reconcile::SweepReport;

/// Buffered events per subscriber before it starts lagging.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Lookups for a new pass have been dispatched.
    PassStarted {
        generation: Generation,
        movies: usize,
        shows: usize,
    },
    /// The directory walk for a pass failed; the pass never dispatches.
    ScanFailed {
        generation: Generation,
        message: String,
    },
    /// Every lookup of the pass has been merged. The snapshot is immutable.
    Ready {
        generation: Generation,
        library: Arc<Library>,
    },
    /// Artwork bytes for an item that still references them.
    DownloadFinished { reference: ArtworkRef, bytes: Bytes },
    CacheSwept {
        generation: Generation,
        report: SweepReport,
    },
    /// Ready has been emitted and no artwork downloads are outstanding.
    DownloadsSettled { generation: Generation },
}

impl PipelineEvent {
    /// Generation the event belongs to, if it is pass-scoped.
    pub fn generation(&self) -> Option<Generation> {
        match self {
            Self::PassStarted { generation, .. }
            | Self::ScanFailed { generation, .. }
            | Self::Ready { generation, .. }
            | Self::CacheSwept { generation, .. }
            | Self::DownloadsSettled { generation } => Some(*generation),
            Self::DownloadFinished { .. } => None,
        }
    }
}

/// The most recent `Ready` snapshot.
///
/// Published on a `watch` channel next to the broadcast event so that a
/// consumer that lagged past the event still finds the tree.
#[derive(Debug, Clone)]
pub struct ReadyLibrary {
    pub generation: Generation,
    pub library: Arc<Library>,
}

pub type ReadyWatch = watch::Receiver<Option<ReadyLibrary>>;

/// Create the broadcast channel used for pipeline events.
pub fn channel() -> broadcast::Sender<PipelineEvent> {
    let (tx, _) = broadcast::channel(EVENT_CAPACITY);
    tx
}
