//! Builds add-on game containers for libretro-based handheld consoles.
//!
//! A container bundles one game rom, its launch script and artwork, and
//! optionally its own emulator core into a squashfs image, followed by a
//! checksummed trailer and a small ext4 save area:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────┬──────────┬────────────────┐
//! │ squashfs     │ md5(sq)  │ 32 zero bytes│ md5(save)│ ext4 save area │
//! │ (N bytes)    │ 16 bytes │              │ 16 bytes │ 4 MiB          │
//! └──────────────┴──────────┴──────────────┴──────────┴────────────────┘
//! ```
//!
//! - **Resolution** - rom, artwork and core lookup in the resource layout
//! - **Artifact builders** - squashfs, save area and container assembly
//! - **Build pipeline** - staging tree and the single [`build_addon`] entry point
//! - **Preflight checks** - Host tool validation before builds

pub mod artifact;
pub mod build;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod preflight;
pub mod process;
pub mod request;
pub mod resolve;

pub use build::pipeline::{build_addon, BuildOutcome, Toolchain};
pub use config::Config;
pub use error::BuildError;
pub use request::{BuildRequest, CoreSelection, SaveMode};
