use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use codex_common::Generation;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::pipeline::EnrichmentPipeline;
use crate::events::{self, PipelineEvent, ReadyWatch};
use crate::library::Library;
use crate::scanner::scan_library;
use crate::scheduler::{JobResult, JobRunner};

enum Command {
    Rescan {
        root: PathBuf,
        reply: oneshot::Sender<Generation>,
    },
    StartPass {
        library: Library,
        reply: oneshot::Sender<Generation>,
    },
    Shutdown,
}

/// Handle to a coordinator running on its own task.
///
/// Cheap to clone. The coordinator exits when [`shutdown`](Self::shutdown)
/// is called or every handle is dropped.
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PipelineEvent>,
    ready: ReadyWatch,
}

impl PipelineHandle {
    /// Start the worker pool and coordinator. Must be called inside a Tokio
    /// runtime.
    pub fn spawn(runner: Arc<JobRunner>, workers: usize) -> (Self, JoinHandle<()>) {
        let events = events::channel();
        let (pipeline, results) = EnrichmentPipeline::new(runner, workers, events.clone());
        let ready = pipeline.ready();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(pipeline, command_rx, results));
        (
            Self {
                commands,
                events,
                ready,
            },
            task,
        )
    }

    /// Subscribe to pipeline events. Subscribe before starting a pass to see
    /// all of its events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// The latest `Ready` snapshot, unaffected by event lag.
    pub fn ready(&self) -> ReadyWatch {
        self.ready.clone()
    }

    /// Scan `root` on a blocking thread and enrich the result.
    ///
    /// Returns as soon as the new generation exists; the scan itself
    /// continues in the background.
    pub async fn rescan(&self, root: impl Into<PathBuf>) -> Result<Generation> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Rescan {
            root: root.into(),
            reply,
        })?;
        rx.await.context("enrichment coordinator stopped")
    }

    /// Enrich an already-scanned tree.
    pub async fn start_pass(&self, library: Library) -> Result<Generation> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartPass { library, reply })?;
        rx.await.context("enrichment coordinator stopped")
    }

    /// Ask the coordinator to stop after draining the worker pool.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("enrichment coordinator stopped"))
    }
}

async fn run(
    mut pipeline: EnrichmentPipeline,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut results: mpsc::UnboundedReceiver<JobResult>,
) {
    let (scans_tx, mut scans) = mpsc::unbounded_channel::<(Generation, Result<Library>)>();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Rescan { root, reply }) => {
                    let generation = pipeline.begin_scan();
                    let _ = reply.send(generation);
                    let tx = scans_tx.clone();
                    tokio::spawn(async move {
                        let scanned = tokio::task::spawn_blocking(move || scan_library(&root))
                            .await
                            .unwrap_or_else(|e| Err(anyhow::anyhow!("scan task failed: {e}")));
                        let _ = tx.send((generation, scanned));
                    });
                }
                Some(Command::StartPass { library, reply }) => {
                    let generation = pipeline.start_pass(library);
                    let _ = reply.send(generation);
                }
                Some(Command::Shutdown) | None => break,
            },
            Some((generation, scanned)) = scans.recv() => {
                let outcome = match scanned {
                    Ok(library) => pipeline.dispatch(generation, library),
                    Err(e) => pipeline.fail_scan(generation, format!("{e:#}")),
                };
                if let Err(e) = outcome {
                    debug!(error = %e, "Discarding superseded scan");
                }
            }
            Some(result) = results.recv() => {
                if let Err(e) = pipeline.handle_result(result) {
                    debug!(error = %e, "Discarding result");
                }
            }
        }
    }

    info!(generation = %pipeline.generation(), "Enrichment coordinator stopping");
    pipeline.shutdown().await;
}
