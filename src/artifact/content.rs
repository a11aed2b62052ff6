//! Read-only content image: squashfs followed by its trailer.
//!
//! ```text
//! 0       squashfs image             N bytes
//! N       MD5(squashfs)              16
//! N+16    reserved, zero             32
//! N+48    MD5(save-area image)       16   (appended by `seal`)
//! ```

use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::artifact::checksum::{md5_file, Md5Digest, DIGEST_LEN};
use crate::artifact::squashfs::{SquashfsOptions, Squasher};
use crate::error::BuildError;

/// Reserved zero bytes between the two checksums.
pub const RESERVED_LEN: usize = 32;

/// Full trailer length once sealed.
pub const TRAILER_LEN: usize = DIGEST_LEN + RESERVED_LEN + DIGEST_LEN;

#[derive(Debug)]
pub struct ContentImage {
    path: PathBuf,
    squashfs_len: u64,
    squashfs_md5: Md5Digest,
    sealed: bool,
}

impl ContentImage {
    /// Squash `tree_root` into `output` and append the squashfs checksum and
    /// the reserved padding.
    pub fn build(
        squasher: &dyn Squasher,
        tree_root: &Path,
        output: &Path,
        options: &SquashfsOptions,
    ) -> Result<Self, BuildError> {
        tracing::info!(
            compression = %options.compression,
            block_size = %options.block_size,
            "compressing staging tree"
        );
        squasher
            .squash(tree_root, output, options)
            .map_err(|e| BuildError::tool(squasher.name(), e))?;

        let squashfs_len = std::fs::metadata(output)
            .with_context(|| format!("reading squashfs image '{}'", output.display()))?
            .len();
        let squashfs_md5 = md5_file(output)?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(output)
            .with_context(|| format!("opening '{}' for trailer", output.display()))?;
        file.write_all(&squashfs_md5)
            .and_then(|_| file.write_all(&[0u8; RESERVED_LEN]))
            .and_then(|_| file.sync_all())
            .with_context(|| format!("writing trailer to '{}'", output.display()))?;

        Ok(Self {
            path: output.to_path_buf(),
            squashfs_len,
            squashfs_md5,
            sealed: false,
        })
    }

    /// Append the save-area checksum, completing the trailer.
    pub fn seal(&mut self, save_md5: &Md5Digest) -> Result<(), BuildError> {
        if self.sealed {
            return Err(anyhow::anyhow!(
                "content image '{}' is already sealed",
                self.path.display()
            )
            .into());
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening '{}' for sealing", self.path.display()))?;
        file.write_all(save_md5)
            .and_then(|_| file.sync_all())
            .with_context(|| format!("sealing '{}'", self.path.display()))?;
        self.sealed = true;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the squashfs part, `N` in the layout.
    pub fn squashfs_len(&self) -> u64 {
        self.squashfs_len
    }

    pub fn squashfs_md5(&self) -> &Md5Digest {
        &self.squashfs_md5
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Current on-disk length: N+48 before sealing, N+64 after.
    pub fn byte_len(&self) -> u64 {
        let trailer = if self.sealed {
            TRAILER_LEN
        } else {
            TRAILER_LEN - DIGEST_LEN
        };
        self.squashfs_len + trailer as u64
    }
}
