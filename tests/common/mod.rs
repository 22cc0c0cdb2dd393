//! Shared test harness for integration tests.
//!
//! Provides [`StubCatalog`], an in-process gateway with canned records,
//! optional per-title gates and a call log, plus helpers for building
//! library trees on disk and waiting on pipeline events.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use codex::events::PipelineEvent;
use codex::images::AssetCache;
use codex::library::ArtworkRef;
use codex::metadata::{
    ArtworkSource, EpisodeRecord, MetadataGateway, MetadataRecord, SeasonRecord,
};
use codex::scheduler::JobRunner;
use codex_common::Generation;
use tokio::sync::{broadcast, Notify};

/// How long a test waits for an event before failing.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Canned catalog. Titles not registered come back as "no match".
#[derive(Default)]
pub struct StubCatalog {
    movies: HashMap<String, MetadataRecord>,
    shows: HashMap<String, Vec<MetadataRecord>>,
    seasons: HashMap<(u64, u32), SeasonRecord>,
    failing: Vec<String>,
    gates: HashMap<String, Arc<Notify>>,
    image_gates: HashMap<String, Arc<Notify>>,
    show_calls: Mutex<HashMap<String, usize>>,
    /// Every call in arrival order, e.g. `find_show:Dark`, `season:42:1`.
    pub calls: Mutex<Vec<String>>,
    /// Signalled whenever a gated lookup is entered.
    pub entered: Notify,
    pub image_fetches: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movie(mut self, title: &str, id: u64, artwork: &str) -> Self {
        self.movies.insert(title.to_string(), record(id, title, artwork));
        self
    }

    /// Register a show. Repeated registrations answer successive calls in
    /// order; the last one repeats.
    pub fn show(mut self, title: &str, id: u64, artwork: &str) -> Self {
        self.shows
            .entry(title.to_string())
            .or_default()
            .push(record(id, title, artwork));
        self
    }

    pub fn season(mut self, show_id: u64, number: u32, artwork: &str, stills: &[&str]) -> Self {
        let episodes = stills
            .iter()
            .enumerate()
            .map(|(i, still)| EpisodeRecord {
                episode_number: Some(i as u32 + 1),
                name: Some(format!("Episode {}", i + 1)),
                still: ArtworkRef::parse(*still),
            })
            .collect();
        self.seasons.insert(
            (show_id, number),
            SeasonRecord {
                season_number: number,
                artwork: ArtworkRef::parse(artwork),
                episodes,
            },
        );
        self
    }

    /// Lookups for `title` fail with a transport-style error.
    pub fn failing(mut self, title: &str) -> Self {
        self.failing.push(title.to_string());
        self
    }

    /// The first lookup for `title` waits until the returned gate is
    /// notified.
    pub fn gated(mut self, title: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gates.insert(title.to_string(), gate.clone());
        (self, gate)
    }

    /// Fetching the image at `reference` waits until the returned gate is
    /// notified.
    pub fn gated_image(mut self, reference: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.image_gates.insert(reference.to_string(), gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pass_gate(&self, title: &str, attempt: usize) {
        if attempt > 0 {
            return;
        }
        if let Some(gate) = self.gates.get(title) {
            self.entered.notify_one();
            gate.notified().await;
        }
    }

    fn check_failing(&self, title: &str) -> anyhow::Result<()> {
        if self.failing.iter().any(|t| t == title) {
            anyhow::bail!("connection reset while looking up {title}");
        }
        Ok(())
    }
}

fn record(id: u64, title: &str, artwork: &str) -> MetadataRecord {
    MetadataRecord {
        id,
        title: title.to_string(),
        artwork: ArtworkRef::parse(artwork),
    }
}

#[async_trait]
impl MetadataGateway for StubCatalog {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn find_movie(
        &self,
        title: &str,
        _year: Option<u16>,
    ) -> anyhow::Result<Option<MetadataRecord>> {
        self.log(format!("find_movie:{title}"));
        self.pass_gate(title, 0).await;
        self.check_failing(title)?;
        Ok(self.movies.get(title).cloned())
    }

    async fn find_show(&self, title: &str) -> anyhow::Result<Option<MetadataRecord>> {
        let attempt = {
            let mut calls = self.show_calls.lock().unwrap();
            let count = calls.entry(title.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        self.log(format!("find_show:{title}"));
        self.pass_gate(title, attempt).await;
        self.check_failing(title)?;

        Ok(self.shows.get(title).and_then(|answers| {
            answers
                .get(attempt)
                .or_else(|| answers.last())
                .cloned()
        }))
    }

    async fn season_details(
        &self,
        show_id: u64,
        season_number: u32,
    ) -> anyhow::Result<Option<SeasonRecord>> {
        self.log(format!("season:{show_id}:{season_number}"));
        Ok(self.seasons.get(&(show_id, season_number)).cloned())
    }
}

#[async_trait]
impl ArtworkSource for StubCatalog {
    async fn fetch_image(&self, reference: &ArtworkRef) -> anyhow::Result<Bytes> {
        self.image_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.image_gates.get(reference.as_str()) {
            self.entered.notify_one();
            gate.notified().await;
        }
        Ok(image_bytes(reference.as_str()))
    }
}

/// Bytes the stub serves for a reference.
pub fn image_bytes(reference: &str) -> Bytes {
    Bytes::from(format!("image:{reference}"))
}

pub fn artwork(reference: &str) -> ArtworkRef {
    ArtworkRef::parse(reference).expect("non-empty reference")
}

pub fn runner(catalog: Arc<StubCatalog>, cache_dir: &Path) -> (Arc<JobRunner>, Arc<AssetCache>) {
    let cache = Arc::new(AssetCache::new(cache_dir, true));
    let runner = Arc::new(JobRunner::new(catalog.clone(), catalog, cache.clone()));
    (runner, cache)
}

/// Create empty files at each relative path under `root`.
pub fn write_tree(root: &Path, files: &[&str]) {
    for relative in files {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }
}

/// Receive events until `stop` returns true for one, returning everything
/// seen (including the stopping event).
pub async fn collect_until(
    events: &mut broadcast::Receiver<PipelineEvent>,
    mut stop: impl FnMut(&PipelineEvent) -> bool,
) -> Vec<PipelineEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for pipeline event")
            .expect("event channel closed");
        let done = stop(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Wait for `DownloadsSettled` of `generation`.
pub async fn until_settled(
    events: &mut broadcast::Receiver<PipelineEvent>,
    generation: Generation,
) -> Vec<PipelineEvent> {
    collect_until(events, |e| {
        matches!(e, PipelineEvent::DownloadsSettled { generation: g } if *g == generation)
    })
    .await
}

/// The Ready snapshot among `events` for `generation`.
pub fn ready_library(
    events: &[PipelineEvent],
    generation: Generation,
) -> Arc<codex::library::Library> {
    events
        .iter()
        .find_map(|e| match e {
            PipelineEvent::Ready {
                generation: g,
                library,
            } if *g == generation => Some(library.clone()),
            _ => None,
        })
        .expect("no Ready event for generation")
}
