//! Concrete catalog implementations.
//!
//! Each submodule wraps a single external API and implements
//! [`MetadataGateway`](super::MetadataGateway) and
//! [`ArtworkSource`](super::ArtworkSource).

pub mod tmdb;

pub use tmdb::TmdbGateway;
