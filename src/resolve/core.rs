//! Emulator core resolution.
//!
//! Stock cores already live on the device under a fixed directory and are
//! referenced by absolute path. Custom cores come from the managed cores
//! directory and are copied into the add-on's `emu/` directory. An unset
//! selection resolves to the configured default core, which is custom.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::build::templates::is_shell_word;
use crate::config::Config;
use crate::error::BuildError;
use crate::request::CoreSelection;

/// On-device directory the add-on's `emu/` is visible under, relative to the
/// launch script's working directory.
pub const BUNDLED_CORE_DIR: &str = "./emu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreOrigin {
    Stock,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreDescriptor {
    Stock {
        file_name: String,
        device_path: PathBuf,
    },
    Custom {
        file_name: String,
        source: PathBuf,
    },
}

impl CoreDescriptor {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Stock { file_name, .. } | Self::Custom { file_name, .. } => file_name,
        }
    }

    pub fn origin(&self) -> CoreOrigin {
        match self {
            Self::Stock { .. } => CoreOrigin::Stock,
            Self::Custom { .. } => CoreOrigin::Custom,
        }
    }

    /// Host file to bundle, only for custom cores.
    pub fn bundled_source(&self) -> Option<&Path> {
        match self {
            Self::Stock { .. } => None,
            Self::Custom { source, .. } => Some(source),
        }
    }

    /// Path the launch script hands to the player on the device.
    pub fn runtime_path(&self) -> String {
        match self {
            Self::Stock { device_path, .. } => device_path.display().to_string(),
            Self::Custom { file_name, .. } => format!("{BUNDLED_CORE_DIR}/{file_name}"),
        }
    }
}

/// Map a selection to a concrete core.
pub fn resolve(config: &Config, selection: &CoreSelection) -> Result<CoreDescriptor, BuildError> {
    let core = match selection {
        CoreSelection::Stock(alias) => resolve_stock(config, alias)?,
        CoreSelection::Custom(name) => resolve_custom(config, name)?,
        CoreSelection::Default => resolve_custom(config, &config.default_core)?,
    };
    // The launch script passes the path unquoted.
    let runtime_path = core.runtime_path();
    if !is_shell_word(&runtime_path) {
        return Err(BuildError::InvalidRequest(format!(
            "core path '{}' cannot be used in the launch script",
            runtime_path.escape_debug()
        )));
    }
    Ok(core)
}

fn resolve_stock(config: &Config, alias: &str) -> Result<CoreDescriptor, BuildError> {
    let Some(file_name) = config.stock_cores.get(alias) else {
        return Err(BuildError::UnknownStockAlias {
            alias: alias.to_string(),
            known: config.stock_cores.keys().cloned().collect(),
        });
    };
    Ok(CoreDescriptor::Stock {
        file_name: file_name.clone(),
        device_path: config.device_core_dir.join(file_name),
    })
}

fn resolve_custom(config: &Config, name: &str) -> Result<CoreDescriptor, BuildError> {
    let source = config.cores_dir().join(name);
    if !source.is_file() {
        return Err(BuildError::MissingCustomCore {
            name: name.to_string(),
            path: source,
        });
    }
    Ok(CoreDescriptor::Custom {
        file_name: name.to_string(),
        source,
    })
}

/// Core files available in the managed cores directory, sorted.
pub fn list_custom_cores(config: &Config) -> Result<Vec<String>, BuildError> {
    let dir = config.cores_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut cores = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("reading cores directory '{}'", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("iterating cores directory '{}'", dir.display()))?;
        if entry.path().is_file() {
            cores.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    cores.sort();
    Ok(cores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_core(temp: &TempDir, name: &str) -> Config {
        let config = Config::with_base_dir(temp.path());
        fs::create_dir_all(config.cores_dir()).unwrap();
        fs::write(config.cores_dir().join(name), b"\x7fELF").unwrap();
        config
    }

    #[test]
    fn test_stock_alias() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_base_dir(temp.path());

        let core = resolve(&config, &CoreSelection::Stock("nes".into())).unwrap();
        assert_eq!(core.origin(), CoreOrigin::Stock);
        assert_eq!(core.file_name(), "quicknes_libretro.so");
        assert_eq!(core.runtime_path(), "/emulator/quicknes_libretro.so");
        assert!(core.bundled_source().is_none());
    }

    #[test]
    fn test_unknown_alias_rejected() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_base_dir(temp.path());

        let err = resolve(&config, &CoreSelection::Stock("n64".into())).unwrap_err();
        match err {
            BuildError::UnknownStockAlias { alias, known } => {
                assert_eq!(alias, "n64");
                assert!(known.contains(&"nes".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_core() {
        let temp = TempDir::new().unwrap();
        let config = config_with_core(&temp, "fceumm_libretro.so");

        let core = resolve(&config, &CoreSelection::Custom("fceumm_libretro.so".into())).unwrap();
        assert_eq!(core.origin(), CoreOrigin::Custom);
        assert_eq!(core.runtime_path(), "./emu/fceumm_libretro.so");
        assert_eq!(
            core.bundled_source(),
            Some(config.cores_dir().join("fceumm_libretro.so").as_path())
        );
    }

    #[test]
    fn test_core_name_with_shell_metacharacters_rejected() {
        let temp = TempDir::new().unwrap();
        let config = config_with_core(&temp, "my core;reboot.so");

        let err = resolve(&config, &CoreSelection::Custom("my core;reboot.so".into())).unwrap_err();
        assert!(matches!(err, BuildError::InvalidRequest(_)), "{err}");
    }

    #[test]
    fn test_missing_custom_core() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_base_dir(temp.path());

        let err = resolve(&config, &CoreSelection::Custom("nope.so".into())).unwrap_err();
        assert!(matches!(err, BuildError::MissingCustomCore { .. }));
    }

    #[test]
    fn test_default_core_is_custom() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_base_dir(temp.path());

        let err = resolve(&config, &CoreSelection::Default).unwrap_err();
        assert!(matches!(err, BuildError::MissingCustomCore { .. }));

        let config = config_with_core(&temp, &config.default_core.clone());
        let core = resolve(&config, &CoreSelection::Default).unwrap();
        assert_eq!(core.origin(), CoreOrigin::Custom);
        assert_eq!(core.file_name(), config.default_core);
    }

    #[test]
    fn test_list_custom_cores() {
        let temp = TempDir::new().unwrap();
        let config = config_with_core(&temp, "b_libretro.so");
        fs::write(config.cores_dir().join("a_libretro.so"), b"").unwrap();

        assert_eq!(
            list_custom_cores(&config).unwrap(),
            vec!["a_libretro.so".to_string(), "b_libretro.so".to_string()]
        );
    }
}
