//! Build failure taxonomy.
//!
//! Every failure the pipeline can report to a front end is a [`BuildError`].
//! Only [`BuildError::ToolUnavailable`] is non-fatal: front ends render it as
//! a warning and continue with the degraded feature switched off.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Mutually exclusive selections were given together.
    #[error("conflicting options: {0}")]
    InputConflict(String),

    /// A request field is unusable (empty name, path separators in an id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no rom named '{rom}' found in {}", .dir.display())]
    MissingRom { rom: String, dir: PathBuf },

    #[error("custom core '{name}' not found at {}", .path.display())]
    MissingCustomCore { name: String, path: PathBuf },

    #[error("unknown stock core '{alias}' (supported: {})", .known.join(", "))]
    UnknownStockAlias { alias: String, known: Vec<String> },

    #[error("{tool} is not available; {degraded}")]
    ToolUnavailable { tool: String, degraded: String },

    #[error("{tool} failed: {detail}")]
    ExternalToolFailure { tool: String, detail: String },

    #[error("save template {} is unusable: {reason}", .path.display())]
    TemplateMissing { path: PathBuf, reason: String },

    #[error("build interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Wrap a host tool error, keeping the full context chain as detail.
    pub(crate) fn tool(tool: &str, err: anyhow::Error) -> Self {
        Self::ExternalToolFailure {
            tool: tool.to_string(),
            detail: format!("{:#}", err),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ToolUnavailable { .. })
    }
}
