//! Artwork normalization.
//!
//! Boxart and bezel images are resized to fixed canonical sizes with
//! ImageMagick. When resizing is switched off the source is copied verbatim.

use anyhow::Result;
use std::path::Path;

use crate::artifact::filesystem::copy_file;
use crate::config::ImageSize;
use crate::error::BuildError;
use crate::process::{self, Cmd};

/// Resize capability: write `src` scaled to exactly `size` at `dest`.
pub trait ImageResizer {
    fn name(&self) -> &str;
    fn resize(&self, src: &Path, dest: &Path, size: ImageSize) -> Result<()>;
}

/// ImageMagick, either the v7 `magick` entry point or the v6 `convert`.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: String,
}

impl ImageMagick {
    /// Programs tried in order when detecting ImageMagick.
    pub const PROGRAMS: &'static [&'static str] = &["magick", "convert"];

    pub fn detect() -> Option<Self> {
        Self::PROGRAMS
            .iter()
            .find(|program| process::exists(program))
            .map(|program| Self {
                program: program.to_string(),
            })
    }
}

impl ImageResizer for ImageMagick {
    fn name(&self) -> &str {
        &self.program
    }

    fn resize(&self, src: &Path, dest: &Path, size: ImageSize) -> Result<()> {
        // `!` forces the exact geometry, ignoring aspect ratio.
        Cmd::new(&self.program)
            .arg_path(src)
            .args(["-resize", &format!("{size}!")])
            .arg_path(dest)
            .error_msg(format!("{} could not resize {}", self.program, src.display()))
            .run()?;
        Ok(())
    }
}

/// Copy `src` to `dest`, resizing to `size` when `enabled`.
///
/// `enabled` is honored as given; a caller without a resizer must pass
/// `false` rather than expect a silent fallback.
pub fn normalize(
    resizer: Option<&dyn ImageResizer>,
    src: &Path,
    dest: &Path,
    size: ImageSize,
    enabled: bool,
) -> Result<(), BuildError> {
    if !enabled {
        copy_file(src, dest)?;
        return Ok(());
    }

    let Some(resizer) = resizer else {
        return Err(BuildError::ToolUnavailable {
            tool: ImageMagick::PROGRAMS.join("/"),
            degraded: "resizing was requested but no resizer is configured".into(),
        });
    };

    tracing::debug!(src = %src.display(), %size, "resizing image");
    resizer
        .resize(src, dest, size)
        .map_err(|e| BuildError::tool(resizer.name(), e))
}
