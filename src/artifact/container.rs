//! Final container assembly and inspection.
//!
//! A container is the sealed content image followed by the save area:
//!
//! ```text
//! 0       squashfs image             N bytes
//! N       MD5(squashfs)              16
//! N+16    reserved, zero             32
//! N+48    MD5(save-area image)       16
//! N+64    save-area image            save_size bytes
//! ```
//!
//! The squashfs length is not stored anywhere; readers derive it from the
//! file length and the fixed save-area size.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::artifact::checksum::{md5_reader, to_hex, Md5Digest, DIGEST_LEN};
use crate::artifact::content::{ContentImage, RESERVED_LEN, TRAILER_LEN};
use crate::artifact::filesystem::atomic_move;
use crate::artifact::save::SaveImage;
use crate::error::BuildError;

/// File extension of finished containers.
pub const CONTAINER_EXTENSION: &str = "uce";

/// Seal `content` with the save checksum and write `content ‖ save` to
/// `work_file`, then move it to `output`.
///
/// `work_file` should live on the same filesystem as `output`; the caller
/// owns its cleanup if this fails partway.
pub fn assemble(
    mut content: ContentImage,
    save: &SaveImage,
    work_file: &Path,
    output: &Path,
) -> Result<(), BuildError> {
    content.seal(save.checksum())?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }

    write_concatenated(&[content.path(), save.path()], work_file)?;

    let expected = content.byte_len()
        + fs::metadata(save.path())
            .with_context(|| format!("reading '{}'", save.path().display()))?
            .len();
    let written = fs::metadata(work_file)
        .with_context(|| format!("reading '{}'", work_file.display()))?
        .len();
    if written != expected {
        return Err(anyhow::anyhow!(
            "container work file is {written} bytes, expected {expected}"
        )
        .into());
    }

    // Replaces an existing container in one step.
    atomic_move(work_file, output)?;

    tracing::info!(
        output = %output.display(),
        bytes = written,
        squashfs_md5 = %to_hex(content.squashfs_md5()),
        save_md5 = %to_hex(save.checksum()),
        "container assembled"
    );
    Ok(())
}

fn write_concatenated(parts: &[&Path], output: &Path) -> Result<()> {
    let out = File::create(output)
        .with_context(|| format!("creating '{}'", output.display()))?;
    let mut writer = BufWriter::new(out);
    for part in parts {
        let mut reader = BufReader::new(
            File::open(part).with_context(|| format!("opening '{}'", part.display()))?,
        );
        io::copy(&mut reader, &mut writer)
            .with_context(|| format!("appending '{}' to '{}'", part.display(), output.display()))?;
    }
    let out = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("flushing '{}'", output.display()))?;
    out.sync_all()
        .with_context(|| format!("syncing '{}'", output.display()))?;
    Ok(())
}

/// Trailer fields of an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    pub total_len: u64,
    pub squashfs_len: u64,
    pub squashfs_md5: Md5Digest,
    pub reserved: [u8; RESERVED_LEN],
    pub save_md5: Md5Digest,
    pub save_offset: u64,
    pub save_len: u64,
}

impl ContainerLayout {
    /// Read the trailer of `path`, assuming a save area of `save_size` bytes.
    pub fn read(path: &Path, save_size: u64) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("opening container '{}'", path.display()))?;
        let total_len = file.metadata()?.len();
        let overhead = save_size + TRAILER_LEN as u64;
        if total_len < overhead {
            bail!(
                "'{}' is {} bytes, too small for a {}-byte save area and trailer",
                path.display(),
                total_len,
                save_size
            );
        }

        let squashfs_len = total_len - overhead;
        let mut trailer = [0u8; TRAILER_LEN];
        file.seek(SeekFrom::Start(squashfs_len))?;
        file.read_exact(&mut trailer)
            .with_context(|| format!("reading trailer of '{}'", path.display()))?;

        let mut squashfs_md5 = [0u8; DIGEST_LEN];
        let mut reserved = [0u8; RESERVED_LEN];
        let mut save_md5 = [0u8; DIGEST_LEN];
        squashfs_md5.copy_from_slice(&trailer[..DIGEST_LEN]);
        reserved.copy_from_slice(&trailer[DIGEST_LEN..DIGEST_LEN + RESERVED_LEN]);
        save_md5.copy_from_slice(&trailer[DIGEST_LEN + RESERVED_LEN..]);

        Ok(Self {
            total_len,
            squashfs_len,
            squashfs_md5,
            reserved,
            save_md5,
            save_offset: squashfs_len + TRAILER_LEN as u64,
            save_len: save_size,
        })
    }
}

/// Outcome of checking a container against its own trailer.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub layout: ContainerLayout,
    pub squashfs_ok: bool,
    pub save_ok: bool,
    pub reserved_zero: bool,
}

impl VerifyReport {
    pub fn is_valid(&self) -> bool {
        self.squashfs_ok && self.save_ok && self.reserved_zero
    }
}

/// Recompute both checksums of `path` and compare them with the trailer.
pub fn verify(path: &Path, save_size: u64) -> Result<VerifyReport> {
    let layout = ContainerLayout::read(path, save_size)?;
    let mut file =
        File::open(path).with_context(|| format!("opening container '{}'", path.display()))?;

    let squashfs = md5_reader(BufReader::new(Read::by_ref(&mut file).take(layout.squashfs_len)))
        .with_context(|| format!("hashing squashfs of '{}'", path.display()))?;

    file.seek(SeekFrom::Start(layout.save_offset))?;
    let save = md5_reader(BufReader::new(file.take(layout.save_len)))
        .with_context(|| format!("hashing save area of '{}'", path.display()))?;

    Ok(VerifyReport {
        squashfs_ok: squashfs == layout.squashfs_md5,
        save_ok: save == layout.save_md5,
        reserved_zero: layout.reserved.iter().all(|b| *b == 0),
        layout,
    })
}

/// Copy the squashfs part of a container to `output`.
pub fn extract_squashfs(path: &Path, save_size: u64, output: &Path) -> Result<()> {
    let layout = ContainerLayout::read(path, save_size)?;
    let file =
        File::open(path).with_context(|| format!("opening container '{}'", path.display()))?;
    let mut out = File::create(output)
        .with_context(|| format!("creating '{}'", output.display()))?;
    io::copy(&mut BufReader::new(file).take(layout.squashfs_len), &mut out)
        .with_context(|| format!("extracting squashfs to '{}'", output.display()))?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::save::SaveFormatter;
    use crate::artifact::squashfs::{SquashfsOptions, Squasher};
    use crate::request::SaveMode;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SAVE: u64 = 64 * 1024;

    struct FixedSquasher;

    impl Squasher for FixedSquasher {
        fn name(&self) -> &str {
            "fixed"
        }

        fn squash(&self, _: &Path, output: &Path, _: &SquashfsOptions) -> Result<()> {
            fs::write(output, b"squashfs-payload-0123456789")?;
            Ok(())
        }
    }

    struct NoopFormatter;

    impl SaveFormatter for NoopFormatter {
        fn name(&self) -> &str {
            "noop"
        }

        fn format(&self, image: &Path, _: u64) -> Result<()> {
            // Mark the image so its digest differs from an all-zero file.
            let mut f = fs::OpenOptions::new().write(true).open(image)?;
            f.write_all(b"ext4")?;
            Ok(())
        }

        fn mkdir(&self, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }

        fn has_dir(&self, _: &Path, _: &str) -> Result<bool> {
            Ok(true)
        }
    }

    fn build_container(temp: &TempDir) -> (std::path::PathBuf, Vec<u8>, Vec<u8>) {
        let content = ContentImage::build(
            &FixedSquasher,
            temp.path(),
            &temp.path().join("content.img"),
            &SquashfsOptions::default(),
        )
        .unwrap();
        let save = SaveImage::build(
            SaveMode::Fresh,
            &NoopFormatter,
            &temp.path().join("none"),
            SAVE,
            &temp.path().join("save.img"),
        )
        .unwrap();
        let save_bytes = fs::read(save.path()).unwrap();

        let output = temp.path().join("out/Game.uce");
        assemble(content, &save, &temp.path().join("work.uce"), &output).unwrap();
        (output, b"squashfs-payload-0123456789".to_vec(), save_bytes)
    }

    #[test]
    fn test_assembled_layout_is_exact() {
        let temp = TempDir::new().unwrap();
        let (output, squashfs, save) = build_container(&temp);
        let bytes = fs::read(&output).unwrap();
        let n = squashfs.len();

        assert_eq!(bytes.len(), n + 64 + SAVE as usize);
        assert_eq!(&bytes[..n], squashfs.as_slice());
        assert_eq!(bytes[n..n + 16], md5_reader(Cursor::new(&squashfs)).unwrap());
        assert!(bytes[n + 16..n + 48].iter().all(|b| *b == 0));
        assert_eq!(bytes[n + 48..n + 64], md5_reader(Cursor::new(&save)).unwrap());
        assert_eq!(&bytes[n + 64..], save.as_slice());
        assert!(!temp.path().join("work.uce").exists());
    }

    #[test]
    fn test_assemble_replaces_existing_output() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out/Game.uce");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, b"previous container").unwrap();

        let (output, squashfs, _) = build_container(&temp);
        let bytes = fs::read(&output).unwrap();
        assert_eq!(bytes.len(), squashfs.len() + 64 + SAVE as usize);
        assert!(verify(&output, SAVE).unwrap().is_valid());
        assert!(!output.with_extension("partial").exists());
    }

    #[test]
    fn test_layout_and_verify() {
        let temp = TempDir::new().unwrap();
        let (output, squashfs, _) = build_container(&temp);

        let layout = ContainerLayout::read(&output, SAVE).unwrap();
        assert_eq!(layout.squashfs_len, squashfs.len() as u64);
        assert_eq!(layout.save_offset, squashfs.len() as u64 + 64);

        let report = verify(&output, SAVE).unwrap();
        assert!(report.is_valid());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let temp = TempDir::new().unwrap();
        let (output, _, _) = build_container(&temp);

        let mut bytes = fs::read(&output).unwrap();
        bytes[0] ^= 0xFF;
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&output, bytes).unwrap();

        let report = verify(&output, SAVE).unwrap();
        assert!(!report.squashfs_ok);
        assert!(!report.save_ok);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_extract_squashfs() {
        let temp = TempDir::new().unwrap();
        let (output, squashfs, _) = build_container(&temp);

        let extracted = temp.path().join("extracted.squashfs");
        extract_squashfs(&output, SAVE, &extracted).unwrap();
        assert_eq!(fs::read(&extracted).unwrap(), squashfs);
    }

    #[test]
    fn test_too_small_container() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tiny.uce");
        fs::write(&path, [0u8; 10]).unwrap();
        assert!(ContainerLayout::read(&path, SAVE).is_err());
    }
}
