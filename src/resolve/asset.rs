//! Rom and artwork lookup by base name.
//!
//! Assets are matched by file stem: `zelda2` matches `zelda2.nes` or
//! `zelda2.png`. The scan is not recursive. When several files share a stem
//! the first entry returned by the directory listing wins; the listing order
//! is whatever the host filesystem yields, so keep one file per stem.

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::templates::fits_double_quotes;
use crate::config::Config;
use crate::error::BuildError;

/// Find the file in `source_dir` whose name without extension is `base_name`.
///
/// A missing or unreadable directory is treated as "no match".
pub fn resolve(source_dir: &Path, base_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(source_dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) == Some(base_name) {
            return Some(path);
        }
    }
    None
}

/// The rom must exist; there is no fallback.
///
/// Its file name is quoted into the launch script, so names that would break
/// out of the quotes are rejected.
pub fn resolve_rom(config: &Config, rom: &str) -> Result<PathBuf, BuildError> {
    let path = resolve(&config.roms_dir, rom).ok_or_else(|| BuildError::MissingRom {
        rom: rom.to_string(),
        dir: config.roms_dir.clone(),
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !fits_double_quotes(&file_name) {
        return Err(BuildError::InvalidRequest(format!(
            "rom file name '{}' cannot be used in the launch script",
            file_name.escape_debug()
        )));
    }
    Ok(path)
}

/// Custom boxart, else the rom-specific default, else the bundled default.
///
/// Returns `None` only when the bundled default is missing too.
pub fn resolve_boxart(config: &Config, rom: &str) -> Option<PathBuf> {
    if let Some(path) = resolve(&config.boxart_dir, rom) {
        tracing::debug!(path = %path.display(), "using custom boxart");
        return Some(path);
    }
    if let Some(path) = resolve(&config.default_boxart_dir(), rom) {
        tracing::debug!(path = %path.display(), "using rom default boxart");
        return Some(path);
    }
    let fallback = config.default_boxart();
    if fallback.is_file() {
        tracing::debug!(path = %fallback.display(), "using bundled default boxart");
        return Some(fallback);
    }
    None
}

/// Custom bezel, else the configured default; no bezel is a valid outcome.
pub fn resolve_bezel(config: &Config, rom: &str) -> Option<PathBuf> {
    if let Some(path) = resolve(&config.bezel_dir, rom) {
        return Some(path);
    }
    let fallback = config.default_bezel();
    fallback.is_file().then_some(fallback)
}
