//! Configuration persistence using toml_edit to preserve formatting and comments.

use anyhow::{Context, Result};
use codex_common::Error;
use std::path::Path;
use toml_edit::{value, DocumentMut};

/// Persist the library root, leaving every other key and comment intact.
///
/// Creates the file (and its parent directory) when it does not exist yet.
pub fn set_library_root(path: &Path, root: &Path) -> Result<()> {
    let mut doc: DocumentMut = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        content
            .parse::<DocumentMut>()
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        DocumentMut::new()
    };

    let root_str = root
        .to_str()
        .with_context(|| format!("Library root is not valid UTF-8: {:?}", root))?;
    doc["library_root"] = value(root_str);

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    tracing::info!(root = %root.display(), config = %path.display(), "Library root saved");
    Ok(())
}
