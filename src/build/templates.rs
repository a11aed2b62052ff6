//! Descriptor and launch script templates.
//!
//! The built-in templates can be replaced by dropping files with the same
//! names into the resources `templates/` directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const DESCRIPTOR_TEMPLATE: &str = "cartridge.xml";
pub const EXEC_TEMPLATE: &str = "exec.sh";
pub const EXEC_BEZEL_TEMPLATE: &str = "exec-bezel.sh";

const GAME_NAME: &str = "{GAME_NAME}";
const CORE_PATH: &str = "{CORE_PATH}";
const ROM_FILE: &str = "{ROM_FILE}";

const BUILTIN_DESCRIPTOR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<byog_cartridge version="1.0">
  <title>{GAME_NAME}</title>
  <desc>{GAME_NAME}</desc>
  <boxart file="boxart/boxart.png" ext="png"/>
  <icon file="title.png" ext="png"/>
</byog_cartridge>
"#;

const BUILTIN_EXEC: &str = r#"#!/bin/sh
set -x
/emulator/retroplayer {CORE_PATH} "./roms/{ROM_FILE}"
"#;

const BUILTIN_EXEC_BEZEL: &str = r#"#!/bin/sh
set -x
/emulator/retroplayer {CORE_PATH} "./roms/{ROM_FILE}" --bezel ./boxart/addon.z.png
"#;

#[derive(Debug, Clone)]
pub struct Templates {
    descriptor: String,
    exec: String,
    exec_bezel: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            descriptor: BUILTIN_DESCRIPTOR.to_string(),
            exec: BUILTIN_EXEC.to_string(),
            exec_bezel: BUILTIN_EXEC_BEZEL.to_string(),
        }
    }
}

impl Templates {
    /// Built-in templates, each overridden by a same-named file in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let builtin = Self::default();
        Ok(Self {
            descriptor: load_or(dir, DESCRIPTOR_TEMPLATE, builtin.descriptor)?,
            exec: load_or(dir, EXEC_TEMPLATE, builtin.exec)?,
            exec_bezel: load_or(dir, EXEC_BEZEL_TEMPLATE, builtin.exec_bezel)?,
        })
    }

    pub fn render_descriptor(&self, game_name: &str) -> String {
        self.descriptor.replace(GAME_NAME, &xml_escape(game_name))
    }

    /// Launch script; the bezel variant is used only when a bezel is staged.
    pub fn render_exec(&self, core_path: &str, rom_file: &str, with_bezel: bool) -> String {
        let template = if with_bezel {
            &self.exec_bezel
        } else {
            &self.exec
        };
        template
            .replace(CORE_PATH, core_path)
            .replace(ROM_FILE, rom_file)
    }
}

/// Whether `value` can sit inside a double-quoted `sh` string verbatim.
pub fn fits_double_quotes(value: &str) -> bool {
    !value
        .chars()
        .any(|c| matches!(c, '"' | '$' | '`' | '\\') || c.is_control())
}

/// Whether `value` is a single unquoted `sh` word with no expansions.
pub fn is_shell_word(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | '/'))
}

fn load_or(dir: &Path, name: &str, builtin: String) -> Result<String> {
    let path = dir.join(name);
    if !path.is_file() {
        return Ok(builtin);
    }
    tracing::debug!(path = %path.display(), "using template override");
    fs::read_to_string(&path).with_context(|| format!("reading template '{}'", path.display()))
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
