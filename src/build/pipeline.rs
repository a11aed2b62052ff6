//! The build pipeline: one request in, one container out.
//!
//! ```text
//! resolve core ─┐
//! resolve rom ──┼─> staging tree ─> content image ─┐
//! resolve art ──┘                                   ├─> container
//!                              save-area image ─────┘
//! ```
//!
//! Inputs are resolved before anything is written, so a missing core or rom
//! never leaves a work area behind. Every later step runs inside a
//! [`WorkArea`] whose drop removes all intermediate state; the container only
//! appears at its final path through a rename after assembly succeeded.

use std::path::PathBuf;

use crate::artifact::container::{assemble, CONTAINER_EXTENSION};
use crate::artifact::content::ContentImage;
use crate::artifact::filesystem::dir_size;
use crate::artifact::image::{ImageMagick, ImageResizer};
use crate::artifact::save::{E2fsprogs, SaveFormatter, SaveImage};
use crate::artifact::squashfs::{Mksquashfs, Squasher};
use crate::build::staging;
use crate::build::workspace::WorkArea;
use crate::config::Config;
use crate::error::BuildError;
use crate::interrupt;
use crate::request::BuildRequest;
use crate::resolve::{resolve_assets, CoreOrigin};

/// Host tool implementations the pipeline drives.
pub struct Toolchain {
    /// `None` when no resize tool is installed.
    pub resizer: Option<Box<dyn ImageResizer>>,
    pub squasher: Box<dyn Squasher>,
    pub formatter: Box<dyn SaveFormatter>,
}

impl Toolchain {
    /// ImageMagick (if installed), mksquashfs and e2fsprogs.
    pub fn host() -> Self {
        Self {
            resizer: ImageMagick::detect().map(|m| Box::new(m) as Box<dyn ImageResizer>),
            squasher: Box::new(Mksquashfs),
            formatter: Box::new(E2fsprogs),
        }
    }

    /// Switch resizing off when no resizer is available.
    ///
    /// Returns the request to build and, when it had to be degraded, the
    /// non-fatal [`BuildError::ToolUnavailable`] to show the user.
    pub fn degrade(&self, request: &BuildRequest) -> (BuildRequest, Option<BuildError>) {
        if request.resize() && self.resizer.is_none() {
            let warning = BuildError::ToolUnavailable {
                tool: ImageMagick::PROGRAMS.join("/"),
                degraded: "artwork is copied without resizing".into(),
            };
            return (request.without_resize(), Some(warning));
        }
        (request.clone(), None)
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub output: PathBuf,
    pub core: String,
    pub core_origin: CoreOrigin,
    pub bezel: bool,
    pub bytes: u64,
}

/// Output path for a request: `<output dir>/<sanitized name>.uce`.
pub fn output_path(config: &Config, request: &BuildRequest) -> PathBuf {
    config
        .output_dir
        .join(format!("{}.{}", request.sanitized_name(), CONTAINER_EXTENSION))
}

/// Build the container for `request`.
pub fn build_addon(
    request: &BuildRequest,
    config: &Config,
    tools: &Toolchain,
) -> Result<BuildOutcome, BuildError> {
    interrupt::check()?;

    let assets = resolve_assets(config, request)?;
    tracing::info!(
        game = %request.game_name(),
        rom = %assets.rom.display(),
        core = %assets.core.file_name(),
        origin = ?assets.core.origin(),
        "resolved inputs"
    );

    let name = request.sanitized_name();
    let output = output_path(config, request);
    let mut work = WorkArea::create(&config.work_root, &name)?;
    let work_file =
        work.track(config.output_dir.join(format!(".{name}.{CONTAINER_EXTENSION}.work")));

    let tree = staging::build(
        &work.staging_dir(),
        &assets,
        request,
        config,
        tools.resizer.as_deref(),
    )?;
    tracing::debug!(bytes = dir_size(tree.root())?, "staging tree size");
    interrupt::check()?;

    let content = ContentImage::build(
        tools.squasher.as_ref(),
        tree.root(),
        &work.content_image(),
        &config.squashfs,
    )?;
    interrupt::check()?;

    let save = SaveImage::build(
        request.save_mode(),
        tools.formatter.as_ref(),
        &config.save_template(),
        config.save_size,
        &work.save_image(),
    )?;
    interrupt::check()?;

    assemble(content, &save, &work_file, &output)?;
    let bytes = std::fs::metadata(&output)
        .map_err(|e| anyhow::anyhow!("reading '{}': {e}", output.display()))?
        .len();

    // `work` drops here and removes the staging tree and intermediates.
    drop(work);

    Ok(BuildOutcome {
        output,
        core: assets.core.runtime_path(),
        core_origin: assets.core.origin(),
        bezel: tree.has_bezel(),
        bytes,
    })
}
