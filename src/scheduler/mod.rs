//! Bounded worker pool for fetch, download and sweep jobs.
//!
//! Workers share one job queue and post every outcome to a single results
//! channel owned by the enrichment coordinator. Workers never see the
//! library tree and never wait on each other; dependent work is submitted
//! by the coordinator after it has consumed the prerequisite's result.

mod job;
mod runner;

pub use job::{
    CurrentGeneration, Downloaded, FetchJob, ImageSource, JobOutcome, JobResult, ScheduledJob,
};
pub use runner::JobRunner;

use std::sync::Arc;

use codex_common::{ErrorKind, Generation};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fixed-size pool of worker tasks.
pub struct TaskScheduler {
    sender: mpsc::UnboundedSender<ScheduledJob>,
    workers: Vec<JoinHandle<()>>,
    current: CurrentGeneration,
}

impl TaskScheduler {
    /// Spawn `workers` tasks (at least one) that run jobs with `runner` and
    /// post outcomes to `results`.
    pub fn start(
        runner: Arc<JobRunner>,
        workers: usize,
        results: mpsc::UnboundedSender<JobResult>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<ScheduledJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let current = runner.current().clone();

        let count = workers.max(1);
        let workers = (0..count)
            .map(|worker| {
                let rx = receiver.clone();
                let runner = runner.clone();
                let results = results.clone();
                tokio::spawn(async move {
                    loop {
                        let next = {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        };
                        let Some(scheduled) = next else { break };
                        let result = execute(&runner, scheduled).await;
                        if results.send(result).is_err() {
                            debug!(worker, "Result channel closed, dropping outcome");
                        }
                    }
                    debug!(worker, "Worker exiting");
                })
            })
            .collect();

        info!(workers = count, "Task scheduler started");
        Self {
            sender,
            workers,
            current,
        }
    }

    /// Mark `generation` as the pass being enriched. Queued sweeps of older
    /// generations become no-ops.
    pub fn advance(&self, generation: Generation) {
        self.current.set(generation);
    }

    /// Queue a job. Never blocks; returns `false` once the pool has shut down.
    pub fn submit(&self, generation: Generation, job: FetchJob) -> bool {
        debug!(generation = %generation, job = job.label(), "Submitting job");
        self.sender.send(ScheduledJob { generation, job }).is_ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work, let queued jobs drain, and wait for the workers.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task failed");
            }
        }
    }
}

/// Run one job on its own task so a panic still yields an outcome.
async fn execute(runner: &Arc<JobRunner>, scheduled: ScheduledJob) -> JobResult {
    let ScheduledJob { generation, job } = scheduled;
    let fallback = job.clone();
    let label = job.label();
    let runner = runner.clone();

    let outcome = match tokio::spawn(async move { runner.run(generation, job).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(generation = %generation, job = label, error = %e, "Job panicked");
            fallback.failed(ErrorKind::Internal)
        }
    };

    JobResult {
        generation,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use codex_common::ItemKey;
    use tokio::sync::Notify;

    use crate::images::AssetCache;
    use crate::library::ArtworkRef;
    use crate::metadata::{ArtworkSource, MetadataGateway, MetadataRecord, SeasonRecord};

    /// Gateway whose "Slow" lookups wait on a gate.
    #[derive(Default)]
    struct GatedGateway {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataGateway for GatedGateway {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn find_movie(
            &self,
            title: &str,
            _year: Option<u16>,
        ) -> anyhow::Result<Option<MetadataRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if title == "Slow" {
                self.gate.notified().await;
            }
            if title == "Broken" {
                anyhow::bail!("status 500");
            }
            Ok(Some(MetadataRecord {
                id: 1,
                title: title.to_string(),
                artwork: ArtworkRef::parse(format!("/{title}.jpg")),
            }))
        }

        async fn find_show(&self, _title: &str) -> anyhow::Result<Option<MetadataRecord>> {
            Ok(None)
        }

        async fn season_details(&self, _: u64, _: u32) -> anyhow::Result<Option<SeasonRecord>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl ArtworkSource for GatedGateway {
        async fn fetch_image(&self, reference: &ArtworkRef) -> anyhow::Result<Bytes> {
            Ok(Bytes::from(format!("bytes of {reference}")))
        }
    }

    fn runner(dir: &std::path::Path, gateway: Arc<GatedGateway>) -> Arc<JobRunner> {
        let cache = Arc::new(AssetCache::new(dir, false));
        Arc::new(JobRunner::new(gateway.clone(), gateway, cache))
    }

    fn movie(title: &str) -> FetchJob {
        FetchJob::MovieLookup {
            key: ItemKey::new(format!("movies/{title}")),
            title: title.to_string(),
            year: None,
        }
    }

    #[tokio::test]
    async fn slow_job_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TaskScheduler::start(runner(dir.path(), gateway.clone()), 2, tx);
        let generation = Generation::initial();

        assert!(scheduler.submit(generation, movie("Slow")));
        assert!(scheduler.submit(generation, movie("Fast")));

        let first = rx.recv().await.unwrap();
        assert_matches::assert_matches!(
            first.outcome,
            JobOutcome::Movie { ref key, result: Ok(Some(_)) } if key.as_str() == "movies/Fast"
        );

        gateway.gate.notify_one();
        let second = rx.recv().await.unwrap();
        assert_matches::assert_matches!(
            second.outcome,
            JobOutcome::Movie { ref key, .. } if key.as_str() == "movies/Slow"
        );
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn failures_still_post_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TaskScheduler::start(runner(dir.path(), gateway.clone()), 1, tx);

        scheduler.submit(Generation::from(7), movie("Broken"));
        let result = rx.recv().await.unwrap();

        assert_eq!(result.generation, Generation::from(7));
        assert_matches::assert_matches!(
            result.outcome,
            JobOutcome::Movie {
                result: Err(ErrorKind::RemoteLookupFailed),
                ..
            }
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_maps_to_remote_lookup_failed() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let cache = Arc::new(AssetCache::new(dir.path(), false));
        let runner = JobRunner::new(gateway.clone(), gateway, cache)
            .with_timeout(Some(std::time::Duration::from_millis(20)));

        let outcome = runner.run(Generation::initial(), movie("Slow")).await;
        assert_matches::assert_matches!(
            outcome,
            JobOutcome::Movie {
                result: Err(ErrorKind::RemoteLookupFailed),
                ..
            }
        );
    }

    #[tokio::test]
    async fn download_checks_cache_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let runner = runner(dir.path(), gateway);
        let reference = ArtworkRef::parse("/x.jpg").unwrap();
        let job = FetchJob::ImageDownload {
            reference: reference.clone(),
        };

        let first = runner.run(Generation::initial(), job.clone()).await;
        assert_matches::assert_matches!(
            first,
            JobOutcome::Image { result: Ok(Downloaded { source: ImageSource::Remote, .. }), .. }
        );
        assert_eq!(
            runner.cache().read(&reference).unwrap(),
            Bytes::from_static(b"bytes of /x.jpg")
        );

        let second = runner.run(Generation::initial(), job).await;
        assert_matches::assert_matches!(
            second,
            JobOutcome::Image { result: Ok(Downloaded { source: ImageSource::Cache, .. }), .. }
        );
    }

    #[tokio::test]
    async fn shutdown_drains_and_rejects_new_work() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TaskScheduler::start(runner(dir.path(), gateway), 3, tx);
        assert_eq!(scheduler.worker_count(), 3);

        for title in ["A", "B", "C", "D"] {
            scheduler.submit(Generation::initial(), movie(title));
        }
        scheduler.shutdown().await;

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 4);
    }

    #[tokio::test]
    async fn superseded_sweep_leaves_cache_alone() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = runner(dir.path(), gateway);
        let old = ArtworkRef::parse("/old.jpg").unwrap();
        let new = ArtworkRef::parse("/new.jpg").unwrap();
        runner.cache().write(&old, b"old").unwrap();
        runner.cache().write(&new, b"new").unwrap();

        let scheduler = TaskScheduler::start(runner.clone(), 1, tx);
        let first = Generation::initial().next();
        scheduler.advance(first);
        // The first pass only knew about the old poster; a rescan began
        // before its sweep reached a worker.
        scheduler.advance(first.next());
        scheduler.submit(
            first,
            FetchJob::CacheSweep {
                live_keys: std::collections::HashSet::from([crate::images::derive_key(&old)]),
            },
        );

        let result = rx.recv().await.unwrap();
        assert_eq!(result.generation, first);
        assert_matches::assert_matches!(
            result.outcome,
            JobOutcome::Sweep {
                result: Err(ErrorKind::StaleResult)
            }
        );
        assert_eq!(runner.cache().list_keys().unwrap().len(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn current_sweep_evicts_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(GatedGateway::default());
        let runner = runner(dir.path(), gateway);
        let kept = ArtworkRef::parse("/kept.jpg").unwrap();
        let orphan = ArtworkRef::parse("/orphan.jpg").unwrap();
        runner.cache().write(&kept, b"kept").unwrap();
        runner.cache().write(&orphan, b"orphan").unwrap();

        let generation = Generation::initial().next();
        runner.current().set(generation);
        let outcome = runner
            .run(
                generation,
                FetchJob::CacheSweep {
                    live_keys: std::collections::HashSet::from([crate::images::derive_key(&kept)]),
                },
            )
            .await;

        assert_matches::assert_matches!(
            outcome,
            JobOutcome::Sweep { result: Ok(report) } if report.evicted == 1 && report.kept == 1
        );
        assert!(runner.cache().read(&orphan).is_none());
    }
}
