//! Artifact builders for the add-on container.
//!
//! - [`image`] - Boxart/bezel normalization (ImageMagick)
//! - [`squashfs`] - Read-only image compression (mksquashfs)
//! - [`content`] - Squashfs plus checksum trailer
//! - [`save`] - Fixed-size ext4 save area (e2fsprogs or bundled template)
//! - [`container`] - Final concatenation, trailer inspection and verification
//! - [`checksum`] - MD5 digests used in the trailer
//! - [`filesystem`] - Copy/move helpers shared by the builders
//!
//! Each host tool sits behind a trait ([`image::ImageResizer`],
//! [`squashfs::Squasher`], [`save::SaveFormatter`]) so the pipeline can run
//! against other implementations.

pub mod checksum;
pub mod container;
pub mod content;
pub mod filesystem;
pub mod image;
pub mod save;
pub mod squashfs;
