//! Builds with the real host tools. Skipped when they are not installed.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use addon_builder::artifact::container;
use addon_builder::artifact::save::E2fsprogs;
use addon_builder::artifact::squashfs::Mksquashfs;
use addon_builder::config::SAVE_AREA_SIZE;
use addon_builder::process::{self, Cmd};
use addon_builder::{build_addon, BuildError, BuildRequest, Config, SaveMode, Toolchain};

fn have(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools.iter().filter(|t| !process::exists(t)).collect();
    if !missing.is_empty() {
        eprintln!("Skipping: missing host tools {:?}", missing);
        return false;
    }
    true
}

fn host_toolchain() -> Toolchain {
    Toolchain {
        resizer: None,
        squasher: Box::new(Mksquashfs),
        formatter: Box::new(E2fsprogs),
    }
}

/// Top-level listing of the save area at the end of `container`.
fn list_save_area(container: &Path, temp: &Path) -> String {
    let report = container::verify(container, SAVE_AREA_SIZE).unwrap();
    assert!(report.is_valid());
    let save = temp.join("save.img");
    let bytes = fs::read(container).unwrap();
    fs::write(&save, &bytes[report.layout.save_offset as usize..]).unwrap();
    Cmd::new("debugfs")
        .args(["-R", "ls -l /"])
        .arg_path(&save)
        .run()
        .unwrap()
        .stdout
}

/// Write a zstd save template: a formatted ext4 image holding `dirs`.
fn write_save_template(config: &Config, dirs: &[&str]) {
    let template = config.save_template();
    fs::create_dir_all(template.parent().unwrap()).unwrap();
    let image = template.with_extension("raw");
    fs::write(&image, vec![0u8; SAVE_AREA_SIZE as usize]).unwrap();
    Cmd::new("mkfs.ext4")
        .args(["-q", "-F"])
        .arg_path(&image)
        .run()
        .unwrap();
    for dir in dirs {
        Cmd::new("debugfs")
            .args(["-w", "-R", &format!("mkdir {dir}")])
            .arg_path(&image)
            .run()
            .unwrap();
    }

    let raw = fs::read(&image).unwrap();
    fs::write(&template, zstd::encode_all(raw.as_slice(), 3).unwrap()).unwrap();
    fs::remove_file(&image).unwrap();
}

fn template_request() -> BuildRequest {
    BuildRequest::new("Zelda II", "zelda2", None, Some("nes"), false, SaveMode::Template).unwrap()
}

#[test]
fn test_template_save_area_with_host_tools() {
    if !have(&["mksquashfs", "mkfs.ext4", "debugfs"]) {
        return;
    }
    let temp = TempDir::new().unwrap();
    let config = Config::with_base_dir(temp.path());
    fs::create_dir_all(&config.roms_dir).unwrap();
    fs::write(config.roms_dir.join("zelda2.nes"), b"NES\x1a rom bytes").unwrap();
    write_save_template(&config, &["upper", "work"]);

    let outcome = build_addon(&template_request(), &config, &host_toolchain()).unwrap();

    let listing = list_save_area(&outcome.output, temp.path());
    assert!(listing.contains("upper"), "{listing}");
    assert!(listing.contains("work"), "{listing}");
}

#[test]
fn test_template_without_upper_rejected_with_host_tools() {
    if !have(&["mksquashfs", "mkfs.ext4", "debugfs"]) {
        return;
    }
    let temp = TempDir::new().unwrap();
    let config = Config::with_base_dir(temp.path());
    fs::create_dir_all(&config.roms_dir).unwrap();
    fs::write(config.roms_dir.join("zelda2.nes"), b"NES\x1a rom bytes").unwrap();
    write_save_template(&config, &["work"]);

    let err = build_addon(&template_request(), &config, &host_toolchain()).unwrap_err();
    match err {
        BuildError::TemplateMissing { reason, .. } => assert!(reason.contains("'upper'")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.output_dir.join("Zelda_II.uce").exists());
}

#[test]
fn test_container_round_trip_with_host_tools() {
    if !have(&["mksquashfs", "unsquashfs", "mkfs.ext4", "debugfs"]) {
        return;
    }

    let temp = TempDir::new().unwrap();
    let config = Config::with_base_dir(temp.path());
    fs::create_dir_all(&config.roms_dir).unwrap();
    fs::write(config.roms_dir.join("zelda2.nes"), b"NES\x1a rom bytes").unwrap();

    let tools = host_toolchain();
    let request =
        BuildRequest::new("Zelda II", "zelda2", None, Some("nes"), false, SaveMode::Fresh)
            .unwrap();
    let outcome = build_addon(&request, &config, &tools).unwrap();

    let report = container::verify(&outcome.output, SAVE_AREA_SIZE).unwrap();
    assert!(report.is_valid());

    // Unpack the squashfs part and compare staged files.
    let squashfs = temp.path().join("content.squashfs");
    container::extract_squashfs(&outcome.output, SAVE_AREA_SIZE, &squashfs).unwrap();
    let unpacked = temp.path().join("unpacked");
    Cmd::new("unsquashfs")
        .arg("-d")
        .arg_path(&unpacked)
        .arg_path(&squashfs)
        .run()
        .unwrap();

    assert_eq!(
        fs::read(unpacked.join("roms/zelda2.nes")).unwrap(),
        b"NES\x1a rom bytes"
    );
    let exec = fs::read_to_string(unpacked.join("exec.sh")).unwrap();
    assert!(exec.contains("/emulator/quicknes_libretro.so"));
    assert!(unpacked.join("save").is_dir());
    assert!(unpacked.join("cartridge.xml").is_file());

    // The save area carries the overlay directories.
    let listing = list_save_area(&outcome.output, temp.path());
    assert!(listing.contains("upper"));
    assert!(listing.contains("work"));
}
