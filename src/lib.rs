//! Codex - local media library indexer with catalog artwork enrichment
//!
//! The library crate exposes the scanner, the enrichment pipeline and the
//! artwork cache so the binary and integration tests share one code path.

pub mod config;
pub mod enrichment;
pub mod events;
pub mod images;
pub mod library;
pub mod metadata;
pub mod reconcile;
pub mod scanner;
pub mod scheduler;
