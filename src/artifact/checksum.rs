//! MD5 digests embedded in the container trailer.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const DIGEST_LEN: usize = 16;

pub type Md5Digest = [u8; DIGEST_LEN];

/// Digest of a whole file, streamed.
pub fn md5_file(path: &Path) -> Result<Md5Digest> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    md5_reader(BufReader::new(f)).with_context(|| format!("Failed to read {}", path.display()))
}

/// Digest of everything `reader` yields.
pub fn md5_reader<R: Read>(mut reader: R) -> Result<Md5Digest> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}

pub fn to_hex(digest: &Md5Digest) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
