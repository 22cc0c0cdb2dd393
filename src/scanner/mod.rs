//! Library scanner.
//!
//! Turns a library root into a fresh [`Library`] tree. The walk is
//! synchronous, never retries, and never touches the network: titles come
//! from directory and file names, artwork is left absent.
//!
//! ```text
//! <root>/movies/Foo (2001)/...            movie directory
//! <root>/movies/Bar (1999).mkv            movie file
//! <root>/shows/<Show>/Season 1/S01E01 - Pilot.mkv
//! <root>/podcasts/<Series>/episode.mp3
//! ```

pub mod parse;

use anyhow::{Context, Result};
use codex_common::paths::{is_audio_file, is_video_file};
use codex_common::{ItemKey, LibrarySection};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::library::{
    Episode, ItemInfo, Library, Movie, PodcastEpisode, PodcastSeries, Season, Show,
};
use parse::{is_season_dir, parse_episode, parse_movie_name, season_number};

/// Scan `root` into a new library tree.
///
/// Missing section directories are fine; a missing root is an error.
pub fn scan_library(root: &Path) -> Result<Library> {
    anyhow::ensure!(root.is_dir(), "Library root is not a directory: {:?}", root);

    let mut library = Library::empty(root);
    for section in LibrarySection::all() {
        let dir = root.join(section.dir_name());
        if !dir.is_dir() {
            debug!(section = section.dir_name(), "Section directory missing, skipping");
            continue;
        }
        match section {
            LibrarySection::Movies => library.movies = scan_movies(root, &dir)?,
            LibrarySection::Shows => library.shows = scan_shows(root, &dir)?,
            LibrarySection::Podcasts => library.podcasts = scan_podcasts(root, &dir)?,
        }
    }

    let counts = library.counts();
    info!(
        root = %root.display(),
        movies = counts.movies,
        shows = counts.shows,
        seasons = counts.seasons,
        episodes = counts.episodes,
        podcasts = counts.podcasts,
        "Library scanned"
    );
    Ok(library)
}

fn scan_movies(root: &Path, dir: &Path) -> Result<Vec<Movie>> {
    let mut movies = Vec::new();
    for entry in children(dir) {
        let path = entry.path();
        let name = if entry.file_type().is_dir() {
            file_name(path)
        } else if is_video_file(path) {
            file_stem(path)
        } else {
            continue;
        };

        let (title, year) = parse_movie_name(&name);
        movies.push(Movie {
            info: ItemInfo::new(item_key(root, path)?, title, path),
            year,
        });
    }
    Ok(movies)
}

fn scan_shows(root: &Path, dir: &Path) -> Result<Vec<Show>> {
    let mut shows = Vec::new();
    for entry in children(dir).filter(|e| e.file_type().is_dir()) {
        let show_path = entry.path();
        let mut seasons = Vec::new();

        for season_entry in children(show_path).filter(|e| e.file_type().is_dir()) {
            let season_name = file_name(season_entry.path());
            if !is_season_dir(&season_name) {
                continue;
            }
            seasons.push(scan_season(root, season_entry.path(), season_name)?);
        }

        if seasons.is_empty() {
            debug!(show = %show_path.display(), "Show has no season directories, skipping");
            continue;
        }
        seasons.sort_by(|a, b| {
            natural(a.number, &a.info.title).cmp(&natural(b.number, &b.info.title))
        });

        shows.push(Show {
            info: ItemInfo::new(item_key(root, show_path)?, file_name(show_path), show_path),
            seasons,
        });
    }
    Ok(shows)
}

fn scan_season(root: &Path, dir: &Path, name: String) -> Result<Season> {
    let mut episodes = Vec::new();
    for entry in children(dir).filter(|e| e.file_type().is_file() && is_video_file(e.path())) {
        let path = entry.path();
        let (number, title) = parse_episode(&file_stem(path));
        episodes.push(Episode {
            info: ItemInfo::new(item_key(root, path)?, title, path),
            number,
        });
    }
    episodes.sort_by(|a, b| natural(a.number, &a.info.title).cmp(&natural(b.number, &b.info.title)));

    Ok(Season {
        number: season_number(&name),
        info: ItemInfo::new(item_key(root, dir)?, name, dir),
        episodes,
    })
}

fn scan_podcasts(root: &Path, dir: &Path) -> Result<Vec<PodcastSeries>> {
    let mut series = Vec::new();
    for entry in children(dir).filter(|e| e.file_type().is_dir()) {
        let series_path = entry.path();
        let mut episodes = Vec::new();
        for episode in children(series_path).filter(|e| e.file_type().is_file() && is_audio_file(e.path())) {
            let path = episode.path();
            episodes.push(PodcastEpisode {
                info: ItemInfo::new(item_key(root, path)?, file_stem(path), path),
            });
        }
        series.push(PodcastSeries {
            info: ItemInfo::new(item_key(root, series_path)?, file_name(series_path), series_path),
            episodes,
        });
    }
    Ok(series)
}

/// Immediate, non-hidden children of `dir`, sorted by name.
fn children(dir: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Failed to read library entry");
                None
            }
        })
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
}

/// Numbered entries first in numeric order, then the rest by name.
fn natural(number: Option<u32>, name: &str) -> (bool, u32, String) {
    (number.is_none(), number.unwrap_or(0), name.to_lowercase())
}

/// Key = path relative to the library root, `/`-separated.
fn item_key(root: &Path, path: &Path) -> Result<ItemKey> {
    let relative: PathBuf = path
        .strip_prefix(root)
        .with_context(|| format!("{:?} is outside the library root", path))?
        .to_path_buf();
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(ItemKey::new(segments.join("/")))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
