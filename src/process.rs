//! Host tool invocation.
//!
//! [`Cmd`] is a small builder over [`std::process::Command`] that captures
//! output, attaches a human-readable message to failures, and keeps argument
//! construction readable at the call sites:
//!
//! ```rust,ignore
//! use addon_builder::process::Cmd;
//!
//! Cmd::new("mksquashfs")
//!     .arg_path(&staging)
//!     .arg_path(&output)
//!     .args(["-comp", "gzip"])
//!     .error_msg("mksquashfs failed. Install squashfs-tools.")
//!     .run()?;
//! ```

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for a single host tool invocation.
#[derive(Debug)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Message prepended to the error when the command exits non-zero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Run with captured stdout/stderr.
    pub fn run(self) -> Result<CommandResult> {
        tracing::debug!(program = %self.program, args = ?self.args, "running host tool");

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            let msg = self
                .error_msg
                .unwrap_or_else(|| format!("{} failed", self.program));
            let stderr = result.stderr.trim();
            if stderr.is_empty() {
                bail!("{} ({})", msg, result.status);
            }
            bail!("{} ({})\n{}", msg, result.status, stderr);
        }

        Ok(result)
    }
}

/// Locate a command in PATH.
pub fn which(cmd: &str) -> Option<String> {
    which::which(cmd)
        .ok()
        .map(|path| path.display().to_string())
}

/// Check if a command exists in PATH.
pub fn exists(cmd: &str) -> bool {
    which(cmd).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exists() {
        assert!(exists("sh"));
        assert!(!exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_run_captures_stdout() {
        let result = Cmd::new("sh").args(["-c", "echo hello"]).run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_failure_carries_message() {
        let err = Cmd::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .error_msg("custom failure")
            .run()
            .unwrap_err()
            .to_string();
        assert!(err.contains("custom failure"));
        assert!(err.contains("oops"));
    }

    #[test]
    fn test_missing_program() {
        let result = Cmd::new("definitely_not_a_real_command_12345").run();
        assert!(result.is_err());
    }
}
