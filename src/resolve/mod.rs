//! Input resolution: which rom, artwork and core a build uses.
//!
//! - [`asset`] - rom/boxart/bezel lookup with default fallbacks
//! - [`core`] - stock vs custom core selection

pub mod asset;
pub mod core;

use std::path::PathBuf;

use crate::config::Config;
use crate::error::BuildError;
use crate::request::BuildRequest;

pub use self::core::{CoreDescriptor, CoreOrigin};

/// Every input a build consumes, resolved to concrete host paths.
#[derive(Debug, Clone)]
pub struct ResolvedAssets {
    pub rom: PathBuf,
    pub boxart: Option<PathBuf>,
    pub bezel: Option<PathBuf>,
    pub core: CoreDescriptor,
}

/// Resolve all inputs for `request`.
///
/// The core is resolved first so a missing custom core fails before the rom
/// or artwork is looked at.
pub fn resolve_assets(
    config: &Config,
    request: &BuildRequest,
) -> Result<ResolvedAssets, BuildError> {
    let core = self::core::resolve(config, request.core())?;
    let rom = asset::resolve_rom(config, request.rom())?;
    let boxart = asset::resolve_boxart(config, request.rom());
    let bezel = asset::resolve_bezel(config, request.rom());

    if boxart.is_none() {
        tracing::warn!(
            path = %config.default_boxart().display(),
            "no boxart found and bundled default is missing; add-on will have no boxart"
        );
    }

    Ok(ResolvedAssets {
        rom,
        boxart,
        bezel,
        core,
    })
}
