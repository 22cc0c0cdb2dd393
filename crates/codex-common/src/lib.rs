//! Codex-Common: Shared types, keys, and utilities.
//!
//! This crate provides functionality used across codex:
//!
//! - **Keys**: stable local item keys and scan-pass generation tags
//! - **Core Types**: enums for library sections and item kinds
//! - **Path Utilities**: functions to detect file types by extension
//! - **Error Handling**: the error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use codex_common::{Error, ErrorKind, Generation, ItemKey, Result};
//! use codex_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let key = ItemKey::new("movies/Heat (1995).mkv");
//! assert_eq!(key.as_str(), "movies/Heat (1995).mkv");
//!
//! let first = Generation::initial().next();
//! assert!(first.next() > first);
//!
//! assert!(is_video_file(Path::new("movie.mkv")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::remote_lookup("find_movie", "timed out"))
//! }
//! assert_eq!(example().unwrap_err().kind(), ErrorKind::RemoteLookupFailed);
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use types::*;
