//! Enrichment passes: dispatch lookups, merge results, fetch artwork.
//!
//! [`EnrichmentPipeline`] is the coordinator state machine. It can be driven
//! directly (feed it results from its receiver) or run on its own task
//! behind a [`PipelineHandle`].

mod handle;
mod pipeline;

pub use handle::PipelineHandle;
pub use pipeline::{EnrichmentPipeline, PassState};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::images::AssetCache;
use crate::metadata::TmdbGateway;
use crate::scheduler::JobRunner;

/// Build a job runner backed by TMDB and the configured cache directory.
pub fn build_runner(config: &Config) -> Result<Arc<JobRunner>> {
    let gateway = Arc::new(TmdbGateway::new(&config.metadata)?);
    let cache = Arc::new(AssetCache::new(
        config.cache.dir.clone(),
        config.cache.memory_layer,
    ));
    let timeout = config.scheduler.job_timeout_secs.map(Duration::from_secs);

    Ok(Arc::new(
        JobRunner::new(gateway.clone(), gateway, cache).with_timeout(timeout),
    ))
}

/// Spawn a coordinator configured from `config`.
pub fn spawn_pipeline(config: &Config) -> Result<(PipelineHandle, tokio::task::JoinHandle<()>)> {
    let runner = build_runner(config)?;
    Ok(PipelineHandle::spawn(
        runner,
        config.scheduler.effective_workers(),
    ))
}
