//! SIGINT/SIGTERM handling.
//!
//! The default signal action kills the process before the work area guard
//! can run. With [`install`] the signal only sets a flag: host tools in the
//! same process group still receive it and exit non-zero, and the pipeline
//! checks [`check`] between steps, so every abort unwinds through the normal
//! error path and cleanup.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::BuildError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the interruption flag.
pub fn install() -> Result<()> {
    for signum in [libc::SIGINT, libc::SIGTERM] {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only performs an atomic store.
        let previous = unsafe { libc::signal(signum, handler) };
        if previous == libc::SIG_ERR {
            bail!("failed to install handler for signal {signum}");
        }
    }
    Ok(())
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Fail with [`BuildError::Interrupted`] once a signal has arrived.
pub fn check() -> Result<(), BuildError> {
    if interrupted() {
        return Err(BuildError::Interrupted);
    }
    Ok(())
}
