//! In-memory library tree.
//!
//! A [`Library`] is built fresh by the scanner for every scan pass and then
//! owned by the enrichment coordinator, which is the only code that mutates
//! it. Consumers receive immutable snapshots (`Arc<Library>`).
//!
//! Shows own their seasons and seasons own their episodes. Nothing points
//! back up the tree: lookups that need a parent's remote id get it passed
//! in explicitly.

mod artwork;

pub use artwork::ArtworkRef;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use codex_common::{ItemKey, ItemKind};
use serde::{Deserialize, Serialize};

/// Fields shared by every library item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// Stable local key derived from the item's path.
    pub key: ItemKey,
    /// Display title.
    pub title: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Remote catalog id, once known.
    pub remote_id: Option<u64>,
    /// Poster (or, for episodes, still) reference from the remote catalog.
    pub artwork: Option<ArtworkRef>,
}

impl ItemInfo {
    /// Create info for a freshly scanned item with no remote data.
    pub fn new(key: ItemKey, title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            key,
            title: title.into(),
            path: path.into(),
            remote_id: None,
            artwork: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(flatten)]
    pub info: ItemInfo,
    pub year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    #[serde(flatten)]
    pub info: ItemInfo,
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    #[serde(flatten)]
    pub info: ItemInfo,
    /// Season number parsed from the directory name, if any.
    pub number: Option<u32>,
    pub episodes: Vec<Episode>,
}

/// A single episode. `info.artwork` holds the episode still.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(flatten)]
    pub info: ItemInfo,
    /// Episode number parsed from an `SxxEyy` marker, if any.
    pub number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastSeries {
    #[serde(flatten)]
    pub info: ItemInfo,
    pub episodes: Vec<PodcastEpisode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastEpisode {
    #[serde(flatten)]
    pub info: ItemInfo,
}

/// Borrowed view over any node of the tree.
#[derive(Debug, Clone, Copy)]
pub enum LibraryItem<'a> {
    Movie(&'a Movie),
    Show(&'a Show),
    Season(&'a Season),
    Episode(&'a Episode),
    PodcastSeries(&'a PodcastSeries),
    PodcastEpisode(&'a PodcastEpisode),
}

impl<'a> LibraryItem<'a> {
    pub fn info(&self) -> &'a ItemInfo {
        match self {
            Self::Movie(m) => &m.info,
            Self::Show(s) => &s.info,
            Self::Season(s) => &s.info,
            Self::Episode(e) => &e.info,
            Self::PodcastSeries(p) => &p.info,
            Self::PodcastEpisode(p) => &p.info,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Movie(_) => ItemKind::Movie,
            Self::Show(_) => ItemKind::Show,
            Self::Season(_) => ItemKind::Season,
            Self::Episode(_) => ItemKind::Episode,
            Self::PodcastSeries(_) => ItemKind::PodcastSeries,
            Self::PodcastEpisode(_) => ItemKind::PodcastEpisode,
        }
    }

    pub fn key(&self) -> &'a ItemKey {
        &self.info().key
    }

    pub fn artwork(&self) -> Option<&'a ArtworkRef> {
        self.info().artwork.as_ref()
    }
}

/// The full tree for one library root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub root: PathBuf,
    pub movies: Vec<Movie>,
    pub shows: Vec<Show>,
    pub podcasts: Vec<PodcastSeries>,
}

impl Library {
    /// An empty library for `root`.
    pub fn empty(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Iterate every node of the tree, parents before children.
    pub fn items(&self) -> impl Iterator<Item = LibraryItem<'_>> {
        let movies = self.movies.iter().map(LibraryItem::Movie);
        let shows = self.shows.iter().flat_map(|show| {
            std::iter::once(LibraryItem::Show(show)).chain(show.seasons.iter().flat_map(
                |season| {
                    std::iter::once(LibraryItem::Season(season))
                        .chain(season.episodes.iter().map(LibraryItem::Episode))
                },
            ))
        });
        let podcasts = self.podcasts.iter().flat_map(|series| {
            std::iter::once(LibraryItem::PodcastSeries(series))
                .chain(series.episodes.iter().map(LibraryItem::PodcastEpisode))
        });
        movies.chain(shows).chain(podcasts)
    }

    /// Every item that currently has artwork, keyed by item.
    pub fn artwork_index(&self) -> HashMap<ItemKey, ArtworkRef> {
        self.items()
            .filter_map(|item| Some((item.key().clone(), item.artwork()?.clone())))
            .collect()
    }

    pub fn movie_mut(&mut self, key: &ItemKey) -> Option<&mut Movie> {
        self.movies.iter_mut().find(|m| &m.info.key == key)
    }

    pub fn show_mut(&mut self, key: &ItemKey) -> Option<&mut Show> {
        self.shows.iter_mut().find(|s| &s.info.key == key)
    }

    pub fn season_mut(&mut self, show_key: &ItemKey, season_key: &ItemKey) -> Option<&mut Season> {
        self.show_mut(show_key)?
            .seasons
            .iter_mut()
            .find(|s| &s.info.key == season_key)
    }

    /// Number of nodes of each kind.
    pub fn counts(&self) -> LibraryCounts {
        let mut counts = LibraryCounts::default();
        for item in self.items() {
            match item.kind() {
                ItemKind::Movie => counts.movies += 1,
                ItemKind::Show => counts.shows += 1,
                ItemKind::Season => counts.seasons += 1,
                ItemKind::Episode => counts.episodes += 1,
                ItemKind::PodcastSeries => counts.podcasts += 1,
                ItemKind::PodcastEpisode => counts.podcast_episodes += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryCounts {
    pub movies: usize,
    pub shows: usize,
    pub seasons: usize,
    pub episodes: usize,
    pub podcasts: usize,
    pub podcast_episodes: usize,
}
