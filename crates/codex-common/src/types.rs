//! Core type definitions for library sections and items.
//!
//! All enums serialize in lowercase so snapshots handed to consumers stay
//! stable across releases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level subtree of a library root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibrarySection {
    /// `movies/`
    Movies,
    /// `shows/`
    Shows,
    /// `podcasts/`
    Podcasts,
}

impl LibrarySection {
    /// Directory name of this section under the library root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Movies => "movies",
            Self::Shows => "shows",
            Self::Podcasts => "podcasts",
        }
    }

    /// Returns all sections in scan order.
    pub fn all() -> &'static [LibrarySection] {
        &[
            LibrarySection::Movies,
            LibrarySection::Shows,
            LibrarySection::Podcasts,
        ]
    }
}

impl fmt::Display for LibrarySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Kind of library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A single movie.
    Movie,
    /// A TV show.
    Show,
    /// A season within a show.
    Season,
    /// A single episode within a season.
    Episode,
    /// A podcast series.
    PodcastSeries,
    /// A single podcast episode.
    PodcastEpisode,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Show => write!(f, "show"),
            Self::Season => write!(f, "season"),
            Self::Episode => write!(f, "episode"),
            Self::PodcastSeries => write!(f, "podcastseries"),
            Self::PodcastEpisode => write!(f, "podcastepisode"),
        }
    }
}
