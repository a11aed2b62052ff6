//! Squashfs image builder.
//!
//! Provides a wrapper around `mksquashfs` for compressing the staging tree
//! into the read-only part of the container.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::process::{self, Cmd};

/// Options for building a squashfs image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SquashfsOptions {
    /// Compression algorithm (gzip, zstd, xz, lzo, lz4).
    ///
    /// Default: "gzip" (the device kernel only ships the gzip decompressor)
    pub compression: String,

    /// Block size (e.g., "128K", "256K", "1M").
    ///
    /// Default: "256K"
    pub block_size: String,

    /// Whether to include extended attributes.
    ///
    /// Default: false
    pub xattrs: bool,
}

impl Default for SquashfsOptions {
    fn default() -> Self {
        Self {
            compression: "gzip".to_string(),
            block_size: "256K".to_string(),
            xattrs: false,
        }
    }
}

/// Compression capability: pack `source_dir` into a single image at `output`.
///
/// Implementations must normalize ownership (everything owned by root) so
/// the image does not carry host uids.
pub trait Squasher {
    fn name(&self) -> &str;
    fn squash(&self, source_dir: &Path, output: &Path, options: &SquashfsOptions) -> Result<()>;
}

/// `mksquashfs` from squashfs-tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mksquashfs;

impl Squasher for Mksquashfs {
    fn name(&self) -> &str {
        "mksquashfs"
    }

    fn squash(&self, source_dir: &Path, output: &Path, options: &SquashfsOptions) -> Result<()> {
        if !source_dir.exists() {
            bail!(
                "Source directory does not exist: {}",
                source_dir.display()
            );
        }
        if !source_dir.is_dir() {
            bail!(
                "Source path is not a directory: {}",
                source_dir.display()
            );
        }

        if !process::exists("mksquashfs") {
            bail!(
                "mksquashfs not found. Install squashfs-tools:\n\
                 On Fedora: sudo dnf install squashfs-tools\n\
                 On Ubuntu: sudo apt install squashfs-tools"
            );
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }

        let mut cmd = Cmd::new("mksquashfs")
            .arg_path(source_dir)
            .arg_path(output)
            .args(["-comp", options.compression.as_str()])
            .args(["-b", options.block_size.as_str()])
            .arg("-noappend")
            .arg("-all-root")
            .arg("-quiet");
        if !options.xattrs {
            cmd = cmd.arg("-no-xattrs");
        }
        cmd.error_msg("mksquashfs failed. Install squashfs-tools: sudo dnf install squashfs-tools")
            .run()?;

        let metadata = fs::metadata(output)?;
        tracing::info!(bytes = metadata.len(), "squashfs created");

        Ok(())
    }
}
