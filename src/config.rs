//! Builder configuration.
//!
//! Everything the resolvers and builders need to know about the host layout
//! and the target device lives in [`Config`]: source directories, the managed
//! resources directory, the stock core alias table, canonical image sizes and
//! squashfs settings. There is no process-wide state; the front end loads one
//! `Config` and passes it down.
//!
//! # File format
//!
//! ```toml
//! resources_dir = "resources"
//! roms_dir = "roms"
//! output_dir = "output"
//! default_core = "fbneo_libretro.so"
//!
//! [stock_cores]
//! nes = "quicknes_libretro.so"
//!
//! [boxart_size]
//! width = 222
//! height = 306
//!
//! [squashfs]
//! compression = "gzip"
//! block_size = "256K"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::squashfs::SquashfsOptions;

/// Size of the writable save area appended to every container.
pub const SAVE_AREA_SIZE: u64 = 4 * 1024 * 1024;

/// Config file name looked up under the user config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Application directory name under the user config directory.
pub const APP_DIR: &str = "addon-builder";

/// Absolute directory holding the stock cores on the device.
pub const DEVICE_CORE_DIR: &str = "/emulator";

/// Core used when the request selects none. It is bundled, not stock.
pub const DEFAULT_CORE: &str = "fbneo_libretro.so";

/// Built-in stock core alias table: (alias, core file name).
pub const STOCK_CORES: &[(&str, &str)] = &[
    ("2600", "stella2014_libretro.so"),
    ("nes", "quicknes_libretro.so"),
    ("snes", "snes9x_libretro.so"),
    ("genesis", "genesis_plus_gx_libretro.so"),
    ("gb", "gambatte_libretro.so"),
    ("gba", "mgba_libretro.so"),
    ("mame", "mame2003_plus_libretro.so"),
];

/// Target raster size for a normalized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const BOXART: ImageSize = ImageSize {
        width: 222,
        height: 306,
    };
    pub const BEZEL: ImageSize = ImageSize {
        width: 1280,
        height: 720,
    };
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Managed resources: `cores/`, `default/`, `templates/`, `save.img.zst`.
    pub resources_dir: PathBuf,
    /// Rom source directory.
    pub roms_dir: PathBuf,
    /// Custom boxart source directory.
    pub boxart_dir: PathBuf,
    /// Custom bezel source directory.
    pub bezel_dir: PathBuf,
    /// Where finished containers are written.
    pub output_dir: PathBuf,
    /// Parent of the per-build private work areas.
    pub work_root: PathBuf,
    pub device_core_dir: PathBuf,
    pub default_core: String,
    pub stock_cores: BTreeMap<String, String>,
    pub boxart_size: ImageSize,
    pub bezel_size: ImageSize,
    pub save_size: u64,
    pub squashfs: SquashfsOptions,
}

impl Config {
    /// Built-in defaults with every directory rooted at `base_dir`.
    pub fn with_base_dir(base_dir: &Path) -> Self {
        Self {
            resources_dir: base_dir.join("resources"),
            roms_dir: base_dir.join("roms"),
            boxart_dir: base_dir.join("boxart"),
            bezel_dir: base_dir.join("bezel"),
            output_dir: base_dir.join("output"),
            work_root: base_dir.join(".work"),
            device_core_dir: PathBuf::from(DEVICE_CORE_DIR),
            default_core: DEFAULT_CORE.to_string(),
            stock_cores: STOCK_CORES
                .iter()
                .map(|(alias, core)| (alias.to_string(), core.to_string()))
                .collect(),
            boxart_size: ImageSize::BOXART,
            bezel_size: ImageSize::BEZEL,
            save_size: SAVE_AREA_SIZE,
            squashfs: SquashfsOptions::default(),
        }
    }

    /// Load a config file, filling unset fields with defaults rooted at the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base_dir)
            .with_context(|| format!("parsing config '{}'", path.display()))
    }

    /// Resolve the config to use: an explicit path, else the user config
    /// file if one exists, else defaults rooted at `fallback_base`.
    pub fn discover(explicit: Option<&Path>, fallback_base: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = user_config_path() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "using user config");
                return Self::load(&path);
            }
        }
        Ok(Self::with_base_dir(fallback_base))
    }

    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(text)?;
        let mut config = Self::with_base_dir(base_dir);
        let resolve = |p: PathBuf| resolve_path(base_dir, p);

        if let Some(p) = parsed.resources_dir {
            config.resources_dir = resolve(p);
        }
        if let Some(p) = parsed.roms_dir {
            config.roms_dir = resolve(p);
        }
        if let Some(p) = parsed.boxart_dir {
            config.boxart_dir = resolve(p);
        }
        if let Some(p) = parsed.bezel_dir {
            config.bezel_dir = resolve(p);
        }
        if let Some(p) = parsed.output_dir {
            config.output_dir = resolve(p);
        }
        if let Some(p) = parsed.work_root {
            config.work_root = resolve(p);
        }
        if let Some(p) = parsed.device_core_dir {
            if !p.is_absolute() {
                bail!(
                    "device_core_dir must be an absolute device path, got '{}'",
                    p.display()
                );
            }
            config.device_core_dir = p;
        }
        if let Some(core) = parsed.default_core {
            validate_file_name(&core, "default_core")?;
            config.default_core = core;
        }
        if let Some(table) = parsed.stock_cores {
            if table.is_empty() {
                bail!("stock_cores must list at least one alias");
            }
            for core in table.values() {
                validate_file_name(core, "stock_cores entry")?;
            }
            config.stock_cores = table;
        }
        if let Some(size) = parsed.boxart_size {
            validate_size(size, "boxart_size")?;
            config.boxart_size = size;
        }
        if let Some(size) = parsed.bezel_size {
            validate_size(size, "bezel_size")?;
            config.bezel_size = size;
        }
        if let Some(squashfs) = parsed.squashfs {
            config.squashfs = squashfs;
        }

        Ok(config)
    }

    /// Managed directory of bundleable (custom) cores.
    pub fn cores_dir(&self) -> PathBuf {
        self.resources_dir.join("cores")
    }

    /// Rom-specific default boxart, matched by rom id.
    pub fn default_boxart_dir(&self) -> PathBuf {
        self.resources_dir.join("default").join("boxart")
    }

    /// Last-resort boxart used when nothing else matches.
    pub fn default_boxart(&self) -> PathBuf {
        self.resources_dir.join("default").join("boxart.png")
    }

    pub fn default_bezel(&self) -> PathBuf {
        self.resources_dir.join("default").join("bezel.png")
    }

    /// Optional overrides for the built-in descriptor and launch templates.
    pub fn templates_dir(&self) -> PathBuf {
        self.resources_dir.join("templates")
    }

    /// Pre-built, zstd-compressed save-area image.
    pub fn save_template(&self) -> PathBuf {
        self.resources_dir.join("save.img.zst")
    }
}

/// `<user config dir>/addon-builder/config.toml`, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    resources_dir: Option<PathBuf>,
    roms_dir: Option<PathBuf>,
    boxart_dir: Option<PathBuf>,
    bezel_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    work_root: Option<PathBuf>,
    device_core_dir: Option<PathBuf>,
    default_core: Option<String>,
    stock_cores: Option<BTreeMap<String, String>>,
    boxart_size: Option<ImageSize>,
    bezel_size: Option<ImageSize>,
    squashfs: Option<SquashfsOptions>,
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn validate_file_name(name: &str, field: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        bail!("{field} must be a plain file name, got '{name}'");
    }
    Ok(())
}

fn validate_size(size: ImageSize, field: &str) -> Result<()> {
    if size.width == 0 || size.height == 0 {
        bail!("{field} must be non-zero, got {size}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_rooted_at_base() {
        let config = Config::with_base_dir(Path::new("/srv/addons"));
        assert_eq!(config.roms_dir, PathBuf::from("/srv/addons/roms"));
        assert_eq!(
            config.cores_dir(),
            PathBuf::from("/srv/addons/resources/cores")
        );
        assert_eq!(config.save_size, 4 * 1024 * 1024);
        assert_eq!(config.stock_cores["nes"], "quicknes_libretro.so");
        assert_eq!(config.default_core, DEFAULT_CORE);
    }

    #[test]
    fn test_default_core_is_not_a_stock_core() {
        let config = Config::with_base_dir(Path::new("/x"));
        assert!(!config.stock_cores.values().any(|c| c == &config.default_core));
    }

    #[test]
    fn test_toml_overrides_and_relative_paths() {
        let text = r#"
            roms_dir = "my-roms"
            output_dir = "/abs/out"
            default_core = "custom_libretro.so"

            [stock_cores]
            nes = "fceumm_libretro.so"

            [bezel_size]
            width = 640
            height = 480

            [squashfs]
            compression = "xz"
            block_size = "128K"
        "#;
        let config = Config::from_toml_str(text, Path::new("/etc/ab")).unwrap();
        assert_eq!(config.roms_dir, PathBuf::from("/etc/ab/my-roms"));
        assert_eq!(config.output_dir, PathBuf::from("/abs/out"));
        assert_eq!(config.default_core, "custom_libretro.so");
        assert_eq!(config.stock_cores.len(), 1);
        assert_eq!(config.bezel_size, ImageSize { width: 640, height: 480 });
        assert_eq!(config.boxart_size, ImageSize::BOXART);
        assert_eq!(config.squashfs.compression, "xz");
        assert_eq!(config.save_size, SAVE_AREA_SIZE);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = Config::from_toml_str("save_size = 1", Path::new("/"));
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_device_core_dir_rejected() {
        let result = Config::from_toml_str("device_core_dir = \"emulator\"", Path::new("/"));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        let text = "[boxart_size]\nwidth = 0\nheight = 10\n";
        assert!(Config::from_toml_str(text, Path::new("/")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "resources_dir = \"res\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.resources_dir, temp.path().join("res"));
        assert_eq!(config.roms_dir, temp.path().join("roms"));
    }

    #[test]
    fn test_discover_prefers_explicit() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        fs::write(&path, "roms_dir = \"r\"\n").unwrap();

        let config = Config::discover(Some(&path), Path::new("/unused")).unwrap();
        assert_eq!(config.roms_dir, temp.path().join("r"));
    }
}
