use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use codex_common::{Error, ErrorKind, Generation};
use tracing::{debug, warn};

use super::job::{CurrentGeneration, Downloaded, FetchJob, ImageSource, JobOutcome};
use crate::images::{AssetCache, CacheKey};
use crate::library::ArtworkRef;
use crate::metadata::{ArtworkSource, MetadataGateway};
use crate::reconcile::{Reconciler, SweepReport};

/// Executes [`FetchJob`]s on behalf of the worker pool.
///
/// Remote calls go through the gateway; cache I/O runs on the blocking
/// thread pool. Every failure is logged here and reduced to an
/// [`ErrorKind`] so the pool always has an outcome to post.
pub struct JobRunner {
    gateway: Arc<dyn MetadataGateway>,
    artwork: Arc<dyn ArtworkSource>,
    cache: Arc<AssetCache>,
    reconciler: Reconciler,
    current: CurrentGeneration,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(
        gateway: Arc<dyn MetadataGateway>,
        artwork: Arc<dyn ArtworkSource>,
        cache: Arc<AssetCache>,
    ) -> Self {
        Self {
            gateway,
            artwork,
            reconciler: Reconciler::new(cache.clone()),
            cache,
            current: CurrentGeneration::default(),
            timeout: None,
        }
    }

    /// Bound every remote call; an expired call counts as a failed lookup.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// The generation sweeps are checked against. The coordinator advances
    /// it when a new pass begins.
    pub fn current(&self) -> &CurrentGeneration {
        &self.current
    }

    /// Run `job` on behalf of pass `generation`.
    pub async fn run(&self, generation: Generation, job: FetchJob) -> JobOutcome {
        match job {
            FetchJob::MovieLookup { key, title, year } => {
                let result = self
                    .remote("find_movie", self.gateway.find_movie(&title, year))
                    .await;
                JobOutcome::Movie { key, result }
            }
            FetchJob::ShowLookup { key, title } => {
                let result = self.remote("find_show", self.gateway.find_show(&title)).await;
                JobOutcome::Show { key, result }
            }
            FetchJob::SeasonLookup {
                show_key,
                season_key,
                show_id,
                season_number,
            } => {
                let result = self
                    .remote(
                        "season_details",
                        self.gateway.season_details(show_id, season_number),
                    )
                    .await;
                JobOutcome::Season {
                    show_key,
                    season_key,
                    result,
                }
            }
            FetchJob::ImageDownload { reference } => {
                let result = self.download(&reference).await;
                JobOutcome::Image { reference, result }
            }
            FetchJob::CacheSweep { live_keys } => {
                let result = self.sweep(generation, live_keys).await;
                JobOutcome::Sweep { result }
            }
        }
    }

    /// Sweep the cache unless `generation` has been superseded, in which
    /// case the live set is out of date and nothing may be evicted.
    async fn sweep(
        &self,
        generation: Generation,
        live_keys: HashSet<CacheKey>,
    ) -> Result<SweepReport, ErrorKind> {
        let reconciler = self.reconciler.clone();
        let current = self.current.clone();
        let swept = tokio::task::spawn_blocking(move || {
            reconciler.sweep(&live_keys, || current.check(generation))
        })
        .await
        .map_err(|e| Error::internal(format!("cache sweep task: {e}")))
        .and_then(|result| result);

        swept.map_err(|e| {
            match e.kind() {
                ErrorKind::StaleResult => {
                    debug!(generation = %generation, error = %e, "Skipping superseded cache sweep")
                }
                _ => warn!(generation = %generation, error = %e, "Cache sweep failed"),
            }
            e.kind()
        })
    }

    /// Cache first; on a miss fetch remotely and store before returning.
    ///
    /// A failed cache write still delivers the fetched bytes.
    async fn download(&self, reference: &ArtworkRef) -> Result<Downloaded, ErrorKind> {
        let cache = self.cache.clone();
        let key_ref = reference.clone();
        let cached = tokio::task::spawn_blocking(move || cache.read(&key_ref))
            .await
            .map_err(|e| {
                let err = Error::internal(format!("cache read task: {e}"));
                warn!(reference = %reference, error = %err, "Cache read failed");
                err.kind()
            })?;

        if let Some(bytes) = cached {
            debug!(reference = %reference, bytes = bytes.len(), "Artwork served from cache");
            return Ok(Downloaded {
                bytes,
                source: ImageSource::Cache,
            });
        }

        let bytes = self
            .remote("fetch_image", self.artwork.fetch_image(reference))
            .await?;

        let cache = self.cache.clone();
        let key_ref = reference.clone();
        let payload = bytes.clone();
        match tokio::task::spawn_blocking(move || cache.write(&key_ref, &payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(reference = %reference, error = %e, "Failed to cache artwork");
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Cache write task failed");
            }
        }

        Ok(Downloaded {
            bytes,
            source: ImageSource::Remote,
        })
    }

    async fn remote<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, ErrorKind> {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!("timed out after {limit:?}")),
            },
            None => call.await,
        };

        outcome.map_err(|e| {
            let err = Error::remote_lookup(operation, format!("{e:#}"));
            warn!(gateway = self.gateway.name(), error = %err, "Remote lookup failed");
            err.kind()
        })
    }
}
