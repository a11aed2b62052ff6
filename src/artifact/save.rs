//! Writable save-area image.
//!
//! The save area is a fixed-size ext4 image mounted on the device as the
//! upper and work layers of an overlay. Fresh images are formatted and
//! populated offline with e2fsprogs (`mkfs.ext4`, `debugfs -w`); nothing is
//! mounted on the host. Template images are decompressed from a bundled
//! zstd file.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::artifact::checksum::{md5_file, Md5Digest};
use crate::error::BuildError;
use crate::process::{self, Cmd};
use crate::request::SaveMode;

/// Overlay directories every save area must contain.
pub const SAVE_DIRS: [&str; 2] = ["upper", "work"];

/// Offline filesystem capability for the save area.
pub trait SaveFormatter {
    fn name(&self) -> &str;

    /// Format `image` (already allocated at `size` bytes) with a journaling
    /// filesystem.
    fn format(&self, image: &Path, size: u64) -> Result<()>;

    /// Create a top-level directory inside the unmounted image.
    fn mkdir(&self, image: &Path, dir: &str) -> Result<()>;

    /// Whether `image` is a readable filesystem with a top-level directory
    /// `dir`. Errors only when the tool itself cannot run.
    fn has_dir(&self, image: &Path, dir: &str) -> Result<bool>;
}

/// e2fsprogs: `mkfs.ext4` to format, `debugfs -w` to populate.
#[derive(Debug, Clone, Copy, Default)]
pub struct E2fsprogs;

impl SaveFormatter for E2fsprogs {
    fn name(&self) -> &str {
        "mkfs.ext4"
    }

    fn format(&self, image: &Path, _size: u64) -> Result<()> {
        if !process::exists("mkfs.ext4") {
            bail!(
                "mkfs.ext4 not found. Install e2fsprogs:\n\
                 On Fedora: sudo dnf install e2fsprogs\n\
                 On Ubuntu: sudo apt install e2fsprogs"
            );
        }
        // -F: the target is a regular file, not a block device.
        Cmd::new("mkfs.ext4")
            .args(["-q", "-F", "-L", "save"])
            .arg_path(image)
            .error_msg("mkfs.ext4 failed to format the save area")
            .run()?;
        Ok(())
    }

    fn mkdir(&self, image: &Path, dir: &str) -> Result<()> {
        let result = Cmd::new("debugfs")
            .arg("-w")
            .args(["-R", &format!("mkdir {dir}")])
            .arg_path(image)
            .error_msg(format!("debugfs failed to create '{dir}'"))
            .run()?;

        // debugfs reports request errors on stderr but still exits 0.
        let request_error = result
            .stderr
            .lines()
            .find(|line| line.starts_with("mkdir:"));
        if let Some(line) = request_error {
            bail!("debugfs failed to create '{}': {}", dir, line.trim());
        }
        Ok(())
    }

    fn has_dir(&self, image: &Path, dir: &str) -> Result<bool> {
        let result = Cmd::new("debugfs")
            .args(["-R", &format!("stat /{dir}")])
            .arg_path(image)
            .error_msg(format!("debugfs failed to inspect '{dir}'"))
            .run()?;

        // An image without a valid superblock, or without the entry, only
        // shows up on stderr; stdout carries the inode dump on success.
        if let Some(line) = result.stderr.lines().find(|l| l.contains("while ")) {
            tracing::debug!(image = %image.display(), "{}", line.trim());
        }
        Ok(result
            .stdout
            .lines()
            .any(|line| line.contains("Type: directory")))
    }
}

#[derive(Debug, Clone)]
pub struct SaveImage {
    path: PathBuf,
    checksum: Md5Digest,
}

impl SaveImage {
    /// Build the save area at `output` according to `mode`.
    pub fn build(
        mode: SaveMode,
        formatter: &dyn SaveFormatter,
        template: &Path,
        size: u64,
        output: &Path,
    ) -> Result<Self, BuildError> {
        match mode {
            SaveMode::Fresh => build_fresh(formatter, size, output)?,
            SaveMode::Template => {
                expand_template(template, size, output)?;
                check_overlay_dirs(formatter, output).map_err(|reason| {
                    BuildError::TemplateMissing {
                        path: template.to_path_buf(),
                        reason,
                    }
                })?;
            }
        }

        let checksum = md5_file(output)?;
        Ok(Self {
            path: output.to_path_buf(),
            checksum,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum(&self) -> &Md5Digest {
        &self.checksum
    }
}

fn build_fresh(formatter: &dyn SaveFormatter, size: u64, output: &Path) -> Result<(), BuildError> {
    tracing::info!(bytes = size, "formatting fresh save area");

    allocate_zeroed(output, size)?;
    formatter
        .format(output, size)
        .map_err(|e| BuildError::tool(formatter.name(), e))?;
    for dir in SAVE_DIRS {
        formatter
            .mkdir(output, dir)
            .map_err(|e| BuildError::tool("debugfs", e))?;
    }

    // Formatting must not grow or shrink the image.
    let actual = fs::metadata(output)
        .with_context(|| format!("reading save image '{}'", output.display()))?
        .len();
    if actual != size {
        return Err(BuildError::ExternalToolFailure {
            tool: formatter.name().to_string(),
            detail: format!("save image is {actual} bytes, expected {size}"),
        });
    }
    Ok(())
}

fn allocate_zeroed(path: &Path, size: u64) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating save image '{}'", path.display()))?;
    file.set_len(size)
        .with_context(|| format!("allocating {} bytes for '{}'", size, path.display()))?;
    Ok(())
}

fn expand_template(template: &Path, size: u64, output: &Path) -> Result<(), BuildError> {
    tracing::info!(template = %template.display(), "expanding save area template");

    let unusable = |reason: String| BuildError::TemplateMissing {
        path: template.to_path_buf(),
        reason,
    };

    let input = File::open(template).map_err(|e| unusable(e.to_string()))?;
    let decoder = zstd::stream::read::Decoder::new(input)
        .map_err(|e| unusable(format!("decompression failed: {e}")))?;
    let out = File::create(output)
        .with_context(|| format!("creating save image '{}'", output.display()))?;
    let mut writer = BufWriter::new(out);

    // One byte past the limit is enough to tell an oversized template.
    let written = io::copy(&mut decoder.take(size + 1), &mut writer)
        .map_err(|e| unusable(format!("decompression failed: {e}")))?;
    writer
        .flush()
        .with_context(|| format!("writing save image '{}'", output.display()))?;

    if written > size {
        return Err(unusable(format!("expands to more than {size} bytes")));
    }
    if written != size {
        return Err(unusable(format!(
            "expands to {written} bytes, expected {size}"
        )));
    }
    Ok(())
}

/// Every entry of [`SAVE_DIRS`] must exist in `image`.
fn check_overlay_dirs(formatter: &dyn SaveFormatter, image: &Path) -> Result<(), String> {
    for dir in SAVE_DIRS {
        match formatter.has_dir(image, dir) {
            Ok(true) => {}
            Ok(false) => return Err(format!("missing overlay directory '{dir}'")),
            Err(e) => return Err(format!("{:#}", e)),
        }
    }
    Ok(())
}
