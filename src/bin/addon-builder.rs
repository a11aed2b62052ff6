//! Add-on container builder CLI
//!
//! Packages a rom, its artwork and an emulator core into a `.uce` container.
//!
//! # Usage
//!
//! ```bash
//! # Build with a stock core shipped on the device
//! addon-builder build --name "Zelda II" --rom zelda2 --stock-core nes
//!
//! # Build with a custom core from resources/cores
//! addon-builder build --name "Metal Slug" --rom mslug --core fbneo_libretro.so
//!
//! # Check an existing container's trailer checksums
//! addon-builder verify output/Zelda_II.uce
//!
//! # List stock aliases and custom cores
//! addon-builder cores
//!
//! # Show which host tools are installed
//! addon-builder check
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use addon_builder::artifact::checksum::to_hex;
use addon_builder::artifact::container;
use addon_builder::resolve::core::list_custom_cores;
use addon_builder::{
    build_addon, interrupt, preflight, BuildRequest, Config, SaveMode, Toolchain,
};

#[derive(Parser)]
#[command(name = "addon-builder")]
#[command(author, version, about = "Add-on game container builder", long_about = None)]
struct Cli {
    /// Configuration file (default: user config dir, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a container for one game
    Build {
        /// Game title shown on the device
        #[arg(short, long)]
        name: String,

        /// Rom base name (file name without extension) in the roms directory
        #[arg(short, long)]
        rom: String,

        /// Custom core file name from resources/cores
        #[arg(short, long)]
        core: Option<String>,

        /// Stock core alias (see `cores`)
        #[arg(short, long)]
        stock_core: Option<String>,

        /// Copy artwork without resizing
        #[arg(long)]
        no_resize: bool,

        /// Use the prebuilt save-area template instead of formatting one
        #[arg(long)]
        alt_save: bool,
    },

    /// Check a container's trailer against its contents
    Verify {
        container: PathBuf,

        /// Also write the squashfs part to this path
        #[arg(long)]
        extract: Option<PathBuf>,
    },

    /// List stock core aliases and custom cores
    Cores,

    /// Show which host tools are installed
    Check,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Build {
            name,
            rom,
            core,
            stock_core,
            no_resize,
            alt_save,
        } => {
            let save_mode = if alt_save {
                SaveMode::Template
            } else {
                SaveMode::Fresh
            };
            cmd_build(
                &config,
                &name,
                &rom,
                core.as_deref(),
                stock_core.as_deref(),
                !no_resize,
                save_mode,
            )
        }
        Commands::Verify { container, extract } => {
            cmd_verify(&config, &container, extract.as_deref())
        }
        Commands::Cores => cmd_cores(&config),
        Commands::Check => cmd_check(),
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    Config::discover(explicit, &cwd)
}

fn cmd_build(
    config: &Config,
    name: &str,
    rom: &str,
    core: Option<&str>,
    stock_core: Option<&str>,
    resize: bool,
    save_mode: SaveMode,
) -> Result<()> {
    let request = BuildRequest::new(name, rom, core, stock_core, resize, save_mode)?;

    preflight::check_host_tools()?;
    interrupt::install()?;

    let tools = Toolchain::host();
    let (request, warning) = tools.degrade(&request);
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
        println!("[WARN] {warning}");
    }

    println!("=== Building {} ===\n", request.game_name());
    let start = Instant::now();
    let outcome = build_addon(&request, config, &tools)?;

    println!(
        "\n=== Build Complete ({:.1}s) ===",
        start.elapsed().as_secs_f64()
    );
    println!("  Container: {}", outcome.output.display());
    println!("  Core:      {} ({:?})", outcome.core, outcome.core_origin);
    println!("  Bezel:     {}", if outcome.bezel { "yes" } else { "no" });
    println!("  Size:      {} bytes", outcome.bytes);
    Ok(())
}

fn cmd_verify(config: &Config, path: &Path, extract: Option<&Path>) -> Result<()> {
    let report = container::verify(path, config.save_size)?;
    let layout = &report.layout;

    println!("=== {} ===", path.display());
    println!("  squashfs: {} bytes", layout.squashfs_len);
    println!(
        "  [{}] squashfs md5 {}",
        mark(report.squashfs_ok),
        to_hex(&layout.squashfs_md5)
    );
    println!("  [{}] reserved bytes zero", mark(report.reserved_zero));
    println!(
        "  [{}] save md5 {}",
        mark(report.save_ok),
        to_hex(&layout.save_md5)
    );

    if let Some(output) = extract {
        container::extract_squashfs(path, config.save_size, output)?;
        println!("  squashfs written to {}", output.display());
    }

    if !report.is_valid() {
        bail!("'{}' failed verification", path.display());
    }
    Ok(())
}

fn cmd_cores(config: &Config) -> Result<()> {
    println!("Stock cores ({}):", config.device_core_dir.display());
    for (alias, core) in &config.stock_cores {
        println!("  {:<10} {}", alias, core);
    }

    println!("\nCustom cores ({}):", config.cores_dir().display());
    let custom = list_custom_cores(config)?;
    if custom.is_empty() {
        println!("  (none)");
    }
    for core in custom {
        let marker = if core == config.default_core {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", core, marker);
    }
    Ok(())
}

fn cmd_check() -> Result<()> {
    let mut missing_required = false;
    for status in preflight::tool_status() {
        let kind = if status.required { "" } else { " (optional)" };
        println!(
            "  [{}] {}{} - {}",
            mark(status.found),
            status.tool,
            kind,
            status.package
        );
        missing_required |= status.required && !status.found;
    }
    if !preflight::resize_available() {
        println!("\nArtwork will be copied without resizing.");
    }
    if missing_required {
        bail!("required host tools are missing");
    }
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}
