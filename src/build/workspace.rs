//! Per-build private work area.
//!
//! Everything a build writes before the final container lands under
//! `<work root>/<sanitized name>/`, plus the container work file next to the
//! output. [`WorkArea`] removes all of it when dropped, so cleanup runs on
//! success, on `?` early returns and on panics alike.
//!
//! Two builds with the same sanitized name share a work area and race; no
//! lock is taken.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const STAGING_DIR: &str = "staging";
const CONTENT_IMAGE: &str = "content.img";
const SAVE_IMAGE: &str = "save.img";

/// RAII guard: removes the work area and tracked files on drop.
#[derive(Debug)]
pub struct WorkArea {
    root: PathBuf,
    tracked: Vec<PathBuf>,
    /// Directories above `root` this build created, deepest first.
    created_parents: Vec<PathBuf>,
}

impl WorkArea {
    /// Create a clean work area for `name` under `work_root`.
    pub fn create(work_root: &Path, name: &str) -> Result<Self> {
        let created_parents: Vec<PathBuf> = work_root
            .ancestors()
            .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        let root = work_root.join(name);
        if root.exists() {
            fs::remove_dir_all(&root).with_context(|| {
                format!("removing stale work area '{}'", root.display())
            })?;
        }
        fs::create_dir_all(&root)
            .with_context(|| format!("creating work area '{}'", root.display()))?;
        tracing::debug!(path = %root.display(), "created work area");
        Ok(Self {
            root,
            tracked: Vec::new(),
            created_parents,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn content_image(&self) -> PathBuf {
        self.root.join(CONTENT_IMAGE)
    }

    pub fn save_image(&self) -> PathBuf {
        self.root.join(SAVE_IMAGE)
    }

    /// Register a file outside the work area for removal on drop.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.tracked.push(path.clone());
        path
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        for path in &self.tracked {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
        if let Err(e) = fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to remove work area");
            }
        } else {
            tracing::debug!(path = %self.root.display(), "removed work area");
        }
        // Only removed when empty; another build may still be using them.
        for dir in &self.created_parents {
            if fs::remove_dir(dir).is_err() {
                break;
            }
        }
    }
}
