//! Filesystem utilities for artifact building.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use walkdir::WalkDir;

/// Copy a single file, creating the destination's parent directory.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(src, dst).with_context(|| {
        format!("Failed to copy {} to {}", src.display(), dst.display())
    })?;
    Ok(())
}

/// Write `content` to `path` and mark it executable (0755).
pub fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("reading metadata '{}'", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("setting permissions '{}'", path.display()))?;
    Ok(())
}

/// Atomically move a file by renaming, with fallback to copy+delete.
///
/// Build to a work file, then move it into place so the destination never
/// holds a partial artifact.
pub fn atomic_move(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Different filesystem: copy next to the destination first so the
            // final step is still a rename.
            let staged = dst.with_extension("partial");
            fs::copy(src, &staged).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), staged.display())
            })?;
            if let Err(e) = fs::rename(&staged, dst) {
                let _ = fs::remove_file(&staged);
                return Err(e)
                    .with_context(|| format!("Failed to move into {}", dst.display()));
            }
            fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))?;
            Ok(())
        }
    }
}

/// Total size of regular files below `path`, not following symlinks.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .with_context(|| format!("reading metadata '{}'", entry.path().display()))?
                .len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_file_creates_parent() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.txt");
        let dst = temp.path().join("a/b/dst.txt");
        fs::write(&src, "hello").unwrap();

        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "hello");
    }

    #[test]
    fn test_write_executable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("exec.sh");

        write_executable(&path, "#!/bin/sh\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_atomic_move() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.txt");
        let dst = temp.path().join("dst.txt");

        fs::write(&src, "content").unwrap();
        atomic_move(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "content");
    }

    #[test]
    fn test_dir_size_skips_symlinks() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("a"), [0u8; 10]).unwrap();
        fs::write(temp.path().join("sub/b"), [0u8; 5]).unwrap();
        std::os::unix::fs::symlink("a", temp.path().join("link")).unwrap();

        assert_eq!(dir_size(temp.path()).unwrap(), 15);
    }
}
