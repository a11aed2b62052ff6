//! Add-on build orchestration.
//!
//! This module provides:
//! - [`pipeline`] - The single build entry point and host toolchain
//! - [`staging`] - On-device directory layout before compression
//! - [`templates`] - Descriptor and launch script templates
//! - [`workspace`] - Private work area with guaranteed cleanup

pub mod pipeline;
pub mod staging;
pub mod templates;
pub mod workspace;
