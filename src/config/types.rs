use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding `movies/`, `shows/` and `podcasts/`. Unset until the
    /// user picks one.
    #[serde(default)]
    pub library_root: Option<PathBuf>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Artwork cache directory. Created on first write.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Keep decoded bytes in memory in front of the disk store.
    #[serde(default = "default_true")]
    pub memory_layer: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.cache/codex/artwork").as_ref())
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            memory_layer: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// TMDB v3 API key. Falls back to `TMDB_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Prefix joined with an artwork reference to download it.
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_language() -> String {
    "en-US".to_string()
}
fn default_api_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}
fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w200".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            language: default_language(),
            api_base_url: default_api_base_url(),
            image_base_url: default_image_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Number of worker tasks in the fetch pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Give up on a job after this many seconds. No limit when unset.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
}

pub(crate) const MIN_WORKERS: usize = 2;
pub(crate) const MAX_WORKERS: usize = 16;

fn default_workers() -> usize {
    num_cpus::get().clamp(MIN_WORKERS, MAX_WORKERS)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            job_timeout_secs: None,
        }
    }
}

impl SchedulerConfig {
    /// Worker count actually used; a configured zero still gets one worker.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}
