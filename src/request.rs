//! The validated build request handed from a front end to the pipeline.

use crate::error::BuildError;

/// Which emulator core the add-on runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreSelection {
    /// A core file from the managed cores directory, bundled into the add-on.
    Custom(String),
    /// An alias from the stock core table; the core already lives on the device.
    Stock(String),
    /// Nothing selected: the configured default core, bundled like a custom one.
    Default,
}

/// How the writable save area is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Format a new ext4 image and create the overlay directories.
    #[default]
    Fresh,
    /// Decompress the bundled pre-built image.
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    game_name: String,
    rom: String,
    core: CoreSelection,
    resize: bool,
    save_mode: SaveMode,
}

impl BuildRequest {
    /// Validate front-end input into a request.
    ///
    /// `custom_core` and `stock_core` are mutually exclusive; giving both is
    /// an [`BuildError::InputConflict`].
    pub fn new(
        game_name: &str,
        rom: &str,
        custom_core: Option<&str>,
        stock_core: Option<&str>,
        resize: bool,
        save_mode: SaveMode,
    ) -> Result<Self, BuildError> {
        let core = match (custom_core, stock_core) {
            (Some(custom), Some(stock)) => {
                return Err(BuildError::InputConflict(format!(
                    "custom core '{custom}' and stock core '{stock}' cannot both be selected"
                )))
            }
            (Some(custom), None) => {
                validate_id(custom, "core")?;
                CoreSelection::Custom(custom.to_string())
            }
            (None, Some(stock)) => CoreSelection::Stock(stock.trim().to_ascii_lowercase()),
            (None, None) => CoreSelection::Default,
        };

        let game_name = game_name.trim();
        if game_name.is_empty() {
            return Err(BuildError::InvalidRequest(
                "game name must not be empty".into(),
            ));
        }
        validate_id(rom, "rom")?;

        Ok(Self {
            game_name: game_name.to_string(),
            rom: rom.to_string(),
            core,
            resize,
            save_mode,
        })
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    /// Rom identifier: the rom's file name without its extension.
    pub fn rom(&self) -> &str {
        &self.rom
    }

    pub fn core(&self) -> &CoreSelection {
        &self.core
    }

    pub fn resize(&self) -> bool {
        self.resize
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    /// Copy of this request with resizing switched off.
    pub fn without_resize(&self) -> Self {
        Self {
            resize: false,
            ..self.clone()
        }
    }

    /// File-system safe form of the game name, used for the output file and
    /// the work area.
    pub fn sanitized_name(&self) -> String {
        sanitize_name(&self.game_name)
    }
}

/// Keep ASCII alphanumerics, `-` and `_`; whitespace becomes `_`, anything
/// else is dropped.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    if sanitized.is_empty() {
        "addon".to_string()
    } else {
        sanitized
    }
}

fn validate_id(value: &str, field: &str) -> Result<(), BuildError> {
    if value.is_empty() {
        return Err(BuildError::InvalidRequest(format!(
            "{field} must not be empty"
        )));
    }
    if value.contains('/') || value == "." || value == ".." {
        return Err(BuildError::InvalidRequest(format!(
            "{field} must be a plain name, got '{value}'"
        )));
    }
    Ok(())
}
