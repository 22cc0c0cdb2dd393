//! Trait definitions and records for the remote metadata catalog.
//!
//! Gateway calls run inside scheduled jobs, never on the coordinator. A call
//! that finds nothing returns `Ok(None)`; network, status and payload
//! failures are `Err` and are mapped to `RemoteLookupFailed` by the job.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::library::ArtworkRef;

/// Best match for a movie or show lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Remote catalog id.
    pub id: u64,
    /// Title as the catalog spells it.
    pub title: String,
    /// Poster reference, if the catalog has one.
    pub artwork: Option<ArtworkRef>,
}

/// Season details, including the per-episode stills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub season_number: u32,
    pub artwork: Option<ArtworkRef>,
    /// Episodes in catalog order.
    pub episodes: Vec<EpisodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_number: Option<u32>,
    pub name: Option<String>,
    pub still: Option<ArtworkRef>,
}

/// Lookup interface consumed by the enrichment pipeline.
///
/// Implementations must be shareable across worker tasks.
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    /// Short, lowercase identifier (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// First catalog match for a movie title, optionally narrowed by year.
    async fn find_movie(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> anyhow::Result<Option<MetadataRecord>>;

    /// First catalog match for a show title.
    async fn find_show(&self, title: &str) -> anyhow::Result<Option<MetadataRecord>>;

    /// Details for one season of a show whose remote id is already known.
    async fn season_details(
        &self,
        show_id: u64,
        season_number: u32,
    ) -> anyhow::Result<Option<SeasonRecord>>;
}

/// Fetches raw image bytes for an artwork reference.
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn fetch_image(&self, reference: &ArtworkRef) -> anyhow::Result<Bytes>;
}
