//! Remote metadata lookups.
//!
//! - [`provider`] -- the [`MetadataGateway`] and [`ArtworkSource`] traits and
//!   the records they return.
//! - [`providers`] -- concrete implementations (TMDB).

pub mod provider;
pub mod providers;

pub use provider::{ArtworkSource, EpisodeRecord, MetadataGateway, MetadataRecord, SeasonRecord};
pub use providers::TmdbGateway;
