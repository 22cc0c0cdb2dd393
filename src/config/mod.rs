pub mod persist;
mod types;

pub use persist::set_library_root;
pub use types::*;

use anyhow::{Context, Result};
use codex_common::Error;
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no `--config` is given.
const DEFAULT_PATHS: [&str; 2] = ["./codex.toml", "~/.config/codex/config.toml"];

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;

    expand_paths(&mut config);
    for warning in validate_config(&config) {
        tracing::warn!("{warning}");
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    let mut config = match existing_config_path(custom_path) {
        Some(path) => load_config(&path)?,
        None => Config::default(),
    };
    apply_api_key_env(&mut config, std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

/// The file that `set-root` should write: the explicit path, else the first
/// existing default, else the per-user location.
pub fn config_path(custom_path: Option<&Path>) -> PathBuf {
    existing_config_path(custom_path).unwrap_or_else(|| {
        PathBuf::from(shellexpand::tilde(DEFAULT_PATHS[DEFAULT_PATHS.len() - 1]).as_ref())
    })
}

fn existing_config_path(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

fn apply_api_key_env(config: &mut Config, value: Option<String>) {
    if config.metadata.api_key.is_none() {
        config.metadata.api_key = value.filter(|v| !v.trim().is_empty());
    }
}

fn expand_paths(config: &mut Config) {
    if let Some(root) = &config.library_root {
        config.library_root = Some(expand(root));
    }
    config.cache.dir = expand(&config.cache.dir);
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validate configuration, returning human-readable warnings.
///
/// Nothing here is fatal: a missing key or odd worker count degrades
/// enrichment but never stops a scan.
pub fn validate_config(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.metadata.api_key.is_none() {
        warnings.push(format!(
            "No TMDB API key configured (set metadata.api_key or {API_KEY_ENV}); artwork lookups will fail"
        ));
    }

    if config.scheduler.workers == 0 {
        warnings.push("scheduler.workers is 0; using a single worker".to_string());
    }

    if config.scheduler.job_timeout_secs == Some(0) {
        warnings.push("scheduler.job_timeout_secs is 0; every job will time out".to_string());
    }

    if let Some(root) = &config.library_root {
        if !root.exists() {
            warnings.push(format!("Library root does not exist: {:?}", root));
        }
    }

    warnings
}
