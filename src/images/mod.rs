//! Artwork cache.
//!
//! Downloaded posters and stills are stored on disk under a filename derived
//! from a SHA-256 digest of their [`ArtworkRef`](crate::library::ArtworkRef),
//! so the same reference always lands on the same file and different
//! references never collide. [`AssetCache`] fronts the disk store with an
//! optional in-memory layer keyed the same way.

mod cache;
mod storage;

pub use cache::AssetCache;
pub use storage::{derive_key, CacheKey, DiskStore};
