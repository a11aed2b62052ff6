//! Staging tree: the on-device layout of the add-on before compression.
//!
//! ```text
//! staging/
//! ├── boxart/
//! │   ├── boxart.png
//! │   └── addon.z.png      # bezel, only if one resolved
//! ├── emu/
//! │   └── <core>.so        # only for custom cores
//! ├── roms/
//! │   └── <rom file>       # original file name and extension
//! ├── save/                # empty, save-area mount point
//! ├── title.png -> boxart/boxart.png   # with boxart
//! ├── cartridge.xml
//! └── exec.sh
//! ```

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::filesystem::{copy_file, write_executable};
use crate::artifact::image::{normalize, ImageResizer};
use crate::build::templates::Templates;
use crate::config::Config;
use crate::error::BuildError;
use crate::request::BuildRequest;
use crate::resolve::ResolvedAssets;

pub const TREE_DIRS: [&str; 4] = ["boxart", "emu", "roms", "save"];
pub const BOXART_FILE: &str = "boxart/boxart.png";
pub const BEZEL_FILE: &str = "boxart/addon.z.png";
pub const TITLE_FILE: &str = "title.png";
pub const DESCRIPTOR_FILE: &str = "cartridge.xml";
pub const EXEC_FILE: &str = "exec.sh";

#[derive(Debug)]
pub struct StagingTree {
    root: PathBuf,
    has_boxart: bool,
    has_bezel: bool,
    bundled_core: Option<String>,
    rom_file: String,
}

impl StagingTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_boxart(&self) -> bool {
        self.has_boxart
    }

    pub fn has_bezel(&self) -> bool {
        self.has_bezel
    }

    /// File name of the core copied into `emu/`, if any.
    pub fn bundled_core(&self) -> Option<&str> {
        self.bundled_core.as_deref()
    }

    pub fn rom_file(&self) -> &str {
        &self.rom_file
    }
}

/// Populate `root` from the resolved inputs.
pub fn build(
    root: &Path,
    assets: &ResolvedAssets,
    request: &BuildRequest,
    config: &Config,
    resizer: Option<&dyn ImageResizer>,
) -> Result<StagingTree, BuildError> {
    tracing::info!(path = %root.display(), "populating staging tree");

    for dir in TREE_DIRS {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("creating staging directory '{}'", path.display()))?;
    }

    let rom_file = assets
        .rom
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            anyhow::anyhow!("rom path has no usable file name: {}", assets.rom.display())
        })?
        .to_string();
    copy_file(&assets.rom, &root.join("roms").join(&rom_file))?;

    let has_boxart = match &assets.boxart {
        Some(src) => {
            normalize(
                resizer,
                src,
                &root.join(BOXART_FILE),
                config.boxart_size,
                request.resize(),
            )?;
            true
        }
        None => false,
    };

    let has_bezel = match &assets.bezel {
        Some(src) => {
            normalize(
                resizer,
                src,
                &root.join(BEZEL_FILE),
                config.bezel_size,
                request.resize(),
            )?;
            true
        }
        None => false,
    };

    let bundled_core = match assets.core.bundled_source() {
        Some(src) => {
            let name = assets.core.file_name();
            copy_file(src, &root.join("emu").join(name))?;
            Some(name.to_string())
        }
        None => None,
    };

    if has_boxart {
        let title = root.join(TITLE_FILE);
        std::os::unix::fs::symlink(BOXART_FILE, &title)
            .with_context(|| format!("linking '{}'", title.display()))?;
    }

    let templates = Templates::load(&config.templates_dir())?;
    let descriptor = root.join(DESCRIPTOR_FILE);
    fs::write(&descriptor, templates.render_descriptor(request.game_name()))
        .with_context(|| format!("writing '{}'", descriptor.display()))?;
    write_executable(
        &root.join(EXEC_FILE),
        &templates.render_exec(&assets.core.runtime_path(), &rom_file, has_bezel),
    )?;

    tracing::info!(
        rom = %rom_file,
        core = %assets.core.runtime_path(),
        bundled_core = bundled_core.is_some(),
        bezel = has_bezel,
        "staging tree ready"
    );

    Ok(StagingTree {
        root: root.to_path_buf(),
        has_boxart,
        has_bezel,
        bundled_core,
        rom_file,
    })
}
