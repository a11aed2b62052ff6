//! Preflight checks for build validation.
//!
//! Validates that the host system has the tools a build shells out to, so a
//! missing package is reported up front instead of halfway through a build.
//!
//! # Example
//!
//! ```rust
//! use addon_builder::preflight::check_required_tools;
//!
//! let tools = &[("mksquashfs", "squashfs-tools"), ("debugfs", "e2fsprogs")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

use crate::artifact::image::ImageMagick;
use crate::process;

/// Required host tools for building containers.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("mksquashfs", "squashfs-tools"),
    ("mkfs.ext4", "e2fsprogs"),
    ("debugfs", "e2fsprogs"),
];

/// Tools whose absence only degrades the build.
pub const OPTIONAL_TOOLS: &[(&str, &str)] = &[("magick", "imagemagick"), ("convert", "imagemagick")];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !process::exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check all tools in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

/// Whether any image resize tool is installed.
pub fn resize_available() -> bool {
    ImageMagick::PROGRAMS.iter().any(|p| process::exists(p))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub tool: &'static str,
    pub package: &'static str,
    pub required: bool,
    pub found: bool,
}

/// Availability of every known tool.
pub fn tool_status() -> Vec<ToolStatus> {
    let status = |&(tool, package): &(&'static str, &'static str), required: bool| ToolStatus {
        tool,
        package,
        required,
        found: process::exists(tool),
    };
    REQUIRED_TOOLS
        .iter()
        .map(|t| status(t, true))
        .chain(OPTIONAL_TOOLS.iter().map(|t| status(t, false)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_required_tools_success() {
        // These should exist on any Unix system
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_failure() {
        let tools = &[("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(tools).unwrap_err().to_string();
        assert!(err.contains("nonexistent_command_xyz (install: fake-package)"));
    }

    #[test]
    fn test_tool_status_covers_all_tools() {
        let status = tool_status();
        assert_eq!(status.len(), REQUIRED_TOOLS.len() + OPTIONAL_TOOLS.len());
        assert_eq!(status.iter().filter(|s| s.required).count(), REQUIRED_TOOLS.len());
    }

    #[test]
    fn test_optional_tools_match_resizer_programs() {
        for program in ImageMagick::PROGRAMS {
            assert!(OPTIONAL_TOOLS.iter().any(|(t, _)| t == program));
        }
    }
}
