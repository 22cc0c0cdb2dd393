use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use codex_common::{Error, Generation, ItemKey, Result};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::events::{PipelineEvent, ReadyLibrary, ReadyWatch};
use crate::images::AssetCache;
use crate::library::{ArtworkRef, Library, Season};
use crate::metadata::{MetadataRecord, SeasonRecord};
use crate::reconcile;
use crate::scheduler::{Downloaded, FetchJob, JobOutcome, JobResult, JobRunner, TaskScheduler};

/// Where the current pass is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    /// No pass has started.
    Idle,
    Scanning,
    Dispatching,
    AwaitingResults,
    Reconciling,
    /// The tree is stable; downloads may still be arriving.
    Ready,
}

/// Single-writer coordinator for enrichment passes.
///
/// Owns the library tree and the consuming end of the results channel.
/// Every tree mutation happens in [`handle_result`](Self::handle_result),
/// so the tree needs no locking. Results tagged with an older generation
/// are dropped without touching the tree.
pub struct EnrichmentPipeline {
    scheduler: TaskScheduler,
    cache: Arc<AssetCache>,
    events: broadcast::Sender<PipelineEvent>,
    ready: watch::Sender<Option<ReadyLibrary>>,
    generation: Generation,
    state: PassState,
    library: Library,
    /// Lookup jobs submitted in this generation, seasons included.
    submitted: usize,
    completed: usize,
    /// Outstanding downloads and the items that asked for them.
    downloads: HashMap<ArtworkRef, HashSet<ItemKey>>,
    /// Current artwork per item, mirroring the tree.
    artwork: HashMap<ItemKey, ArtworkRef>,
}

impl EnrichmentPipeline {
    /// Start the worker pool and return the pipeline with the receiver its
    /// results arrive on.
    pub fn new(
        runner: Arc<JobRunner>,
        workers: usize,
        events: broadcast::Sender<PipelineEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<JobResult>) {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let cache = runner.cache().clone();
        let scheduler = TaskScheduler::start(runner, workers, results_tx);

        let pipeline = Self {
            scheduler,
            cache,
            events,
            ready: watch::channel(None).0,
            generation: Generation::initial(),
            state: PassState::Idle,
            library: Library::default(),
            submitted: 0,
            completed: 0,
            downloads: HashMap::new(),
            artwork: HashMap::new(),
        };
        (pipeline, results_rx)
    }

    /// Watch the latest `Ready` snapshot.
    pub fn ready(&self) -> ReadyWatch {
        self.ready.subscribe()
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Lookups still outstanding in the current pass.
    pub fn outstanding(&self) -> usize {
        self.submitted - self.completed
    }

    /// Downloads still outstanding in the current generation.
    pub fn pending_downloads(&self) -> usize {
        self.downloads.len()
    }

    /// Start a new generation. Everything in flight for older generations
    /// becomes stale from this point.
    pub fn begin_scan(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.scheduler.advance(self.generation);
        self.state = PassState::Scanning;
        self.library = Library::default();
        self.submitted = 0;
        self.completed = 0;
        self.downloads.clear();
        self.artwork.clear();
        debug!(generation = %self.generation, "Scan started");
        self.generation
    }

    /// Install a freshly scanned tree and submit its top-level lookups.
    ///
    /// Only movie and show lookups go out here; season lookups wait for
    /// their show's remote id.
    pub fn dispatch(&mut self, generation: Generation, library: Library) -> Result<()> {
        self.check_generation(generation)?;
        self.state = PassState::Dispatching;
        self.artwork = library.artwork_index();
        self.library = library;

        let mut jobs = Vec::with_capacity(self.library.movies.len() + self.library.shows.len());
        for movie in &self.library.movies {
            jobs.push(FetchJob::MovieLookup {
                key: movie.info.key.clone(),
                title: movie.info.title.clone(),
                year: movie.year,
            });
        }
        for show in &self.library.shows {
            jobs.push(FetchJob::ShowLookup {
                key: show.info.key.clone(),
                title: show.info.title.clone(),
            });
        }
        for job in jobs {
            self.submit(job);
        }

        info!(
            generation = %generation,
            movies = self.library.movies.len(),
            shows = self.library.shows.len(),
            podcasts = self.library.podcasts.len(),
            "Enrichment pass dispatched"
        );
        self.emit(PipelineEvent::PassStarted {
            generation,
            movies: self.library.movies.len(),
            shows: self.library.shows.len(),
        });

        self.state = PassState::AwaitingResults;
        self.finish_if_complete();
        Ok(())
    }

    /// Abandon the current pass because its directory walk failed.
    pub fn fail_scan(&mut self, generation: Generation, message: String) -> Result<()> {
        self.check_generation(generation)?;
        warn!(generation = %generation, error = %message, "Library scan failed");
        self.state = PassState::Idle;
        self.emit(PipelineEvent::ScanFailed {
            generation,
            message,
        });
        Ok(())
    }

    /// [`begin_scan`](Self::begin_scan) and [`dispatch`](Self::dispatch) for
    /// a tree that is already scanned.
    pub fn start_pass(&mut self, library: Library) -> Generation {
        let generation = self.begin_scan();
        // Same generation we just created; cannot be stale.
        let _ = self.dispatch(generation, library);
        generation
    }

    /// Merge one job result into the tree.
    ///
    /// Returns [`Error::StaleResult`] when the result belongs to an older
    /// generation; nothing is changed in that case.
    pub fn handle_result(&mut self, result: JobResult) -> Result<()> {
        let JobResult {
            generation,
            outcome,
        } = result;
        self.check_generation(generation)?;

        let is_lookup = outcome.is_lookup();
        match outcome {
            JobOutcome::Movie { key, result } => self.apply_movie(key, result),
            JobOutcome::Show { key, result } => self.apply_show(key, result),
            JobOutcome::Season {
                show_key,
                season_key,
                result,
            } => self.apply_season(&show_key, &season_key, result),
            JobOutcome::Image { reference, result } => self.deliver(reference, result),
            JobOutcome::Sweep { result } => {
                if let Ok(report) = result {
                    self.emit(PipelineEvent::CacheSwept { generation, report });
                }
            }
        }

        if is_lookup {
            self.completed += 1;
            self.finish_if_complete();
        }
        Ok(())
    }

    /// Wait for the worker pool to drain and stop.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }

    fn check_generation(&self, generation: Generation) -> Result<()> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(Error::StaleResult {
                expected: self.generation.get(),
                actual: generation.get(),
            })
        }
    }

    fn submit(&mut self, job: FetchJob) {
        if job.is_lookup() {
            self.submitted += 1;
        }
        if !self.scheduler.submit(self.generation, job) {
            warn!(generation = %self.generation, "Scheduler is shut down, job dropped");
        }
    }

    fn apply_movie(
        &mut self,
        key: ItemKey,
        result: std::result::Result<Option<MetadataRecord>, codex_common::ErrorKind>,
    ) {
        let Ok(Some(record)) = result else {
            debug!(key = %key, "No metadata for movie");
            return;
        };
        let Some(movie) = self.library.movie_mut(&key) else {
            warn!(key = %key, "Movie result for unknown key");
            return;
        };

        movie.info.remote_id = Some(record.id);
        movie.info.artwork = record.artwork.clone();
        self.track_artwork(key.clone(), record.artwork.clone());
        if let Some(reference) = record.artwork {
            self.request_artwork(key, reference);
        }
    }

    fn apply_show(
        &mut self,
        key: ItemKey,
        result: std::result::Result<Option<MetadataRecord>, codex_common::ErrorKind>,
    ) {
        let Ok(Some(record)) = result else {
            debug!(key = %key, "No metadata for show");
            return;
        };
        let Some(show) = self.library.show_mut(&key) else {
            warn!(key = %key, "Show result for unknown key");
            return;
        };

        show.info.remote_id = Some(record.id);
        show.info.artwork = record.artwork.clone();

        // The remote id is set; seasons may now be looked up.
        let seasons: Vec<FetchJob> = show
            .seasons
            .iter()
            .filter_map(|season| {
                Some(FetchJob::SeasonLookup {
                    show_key: key.clone(),
                    season_key: season.info.key.clone(),
                    show_id: record.id,
                    season_number: season.number?,
                })
            })
            .collect();
        debug!(key = %key, show_id = record.id, seasons = seasons.len(), "Show matched");

        self.track_artwork(key.clone(), record.artwork.clone());
        if let Some(reference) = record.artwork {
            self.request_artwork(key, reference);
        }
        for job in seasons {
            self.submit(job);
        }
    }

    fn apply_season(
        &mut self,
        show_key: &ItemKey,
        season_key: &ItemKey,
        result: std::result::Result<Option<SeasonRecord>, codex_common::ErrorKind>,
    ) {
        let Ok(Some(record)) = result else {
            debug!(season = %season_key, "No details for season");
            return;
        };
        let Some(season) = self.library.season_mut(show_key, season_key) else {
            warn!(season = %season_key, "Season result for unknown key");
            return;
        };

        let requests = merge_season(season, record);
        let assigned: Vec<(ItemKey, Option<ArtworkRef>)> =
            std::iter::once((season.info.key.clone(), season.info.artwork.clone()))
                .chain(
                    season
                        .episodes
                        .iter()
                        .map(|e| (e.info.key.clone(), e.info.artwork.clone())),
                )
                .collect();
        for (key, artwork) in assigned {
            self.track_artwork(key, artwork);
        }
        for (owner, reference) in requests {
            self.request_artwork(owner, reference);
        }
    }

    /// Serve artwork from memory if possible, otherwise queue one download
    /// per reference and remember who asked.
    fn request_artwork(&mut self, owner: ItemKey, reference: ArtworkRef) {
        if let Some(bytes) = self.cache.cached(&reference) {
            self.emit(PipelineEvent::DownloadFinished { reference, bytes });
            return;
        }

        let first_request = !self.downloads.contains_key(&reference);
        self.downloads
            .entry(reference.clone())
            .or_default()
            .insert(owner);
        if first_request {
            self.submit(FetchJob::ImageDownload { reference });
        }
    }

    /// Hand downloaded bytes to the owners that still reference them.
    fn deliver(
        &mut self,
        reference: ArtworkRef,
        result: std::result::Result<Downloaded, codex_common::ErrorKind>,
    ) {
        let owners = self.downloads.remove(&reference).unwrap_or_default();

        match result {
            Ok(downloaded) => {
                let interested = owners
                    .iter()
                    .any(|owner| self.artwork.get(owner) == Some(&reference));
                if interested {
                    self.emit(PipelineEvent::DownloadFinished {
                        reference,
                        bytes: downloaded.bytes,
                    });
                } else {
                    debug!(reference = %reference, "Artwork changed since request, discarding download");
                }
            }
            Err(kind) => {
                debug!(reference = %reference, error = %kind, "Artwork download failed");
            }
        }

        self.settle_if_idle();
    }

    fn track_artwork(&mut self, key: ItemKey, artwork: Option<ArtworkRef>) {
        match artwork {
            Some(reference) => {
                self.artwork.insert(key, reference);
            }
            None => {
                self.artwork.remove(&key);
            }
        }
    }

    fn finish_if_complete(&mut self) {
        if self.state != PassState::AwaitingResults || self.completed < self.submitted {
            return;
        }

        self.state = PassState::Reconciling;
        let live_keys = reconcile::live_keys(&self.library);
        self.submit(FetchJob::CacheSweep { live_keys });

        self.state = PassState::Ready;
        info!(
            generation = %self.generation,
            lookups = self.submitted,
            downloads = self.downloads.len(),
            "Enrichment pass ready"
        );
        let library = Arc::new(self.library.clone());
        self.ready.send_replace(Some(ReadyLibrary {
            generation: self.generation,
            library: library.clone(),
        }));
        self.emit(PipelineEvent::Ready {
            generation: self.generation,
            library,
        });
        self.settle_if_idle();
    }

    fn settle_if_idle(&self) {
        if self.state == PassState::Ready && self.downloads.is_empty() {
            self.emit(PipelineEvent::DownloadsSettled {
                generation: self.generation,
            });
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Copy season artwork and episode stills from `record` into `season`.
///
/// Episodes with a number match the record entry with the same number;
/// episodes without one fall back to their position. Anything unmatched
/// keeps absent artwork. Returns the references that need downloading.
fn merge_season(season: &mut Season, record: SeasonRecord) -> Vec<(ItemKey, ArtworkRef)> {
    let mut requests = Vec::new();

    season.info.artwork = record.artwork;
    if let Some(reference) = &season.info.artwork {
        requests.push((season.info.key.clone(), reference.clone()));
    }

    for (index, episode) in season.episodes.iter_mut().enumerate() {
        let matched = match episode.number {
            Some(number) => record
                .episodes
                .iter()
                .find(|e| e.episode_number == Some(number)),
            None => record.episodes.get(index),
        };
        episode.info.artwork = matched.and_then(|e| e.still.clone());
        if let Some(reference) = &episode.info.artwork {
            requests.push((episode.info.key.clone(), reference.clone()));
        }
    }

    requests
}
