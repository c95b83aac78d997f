//! Collector Service - Downloads the published COVID-19 case file
//!
//! Usage:
//!   cargo run --bin collector
//!   cargo run --bin collector -- --output-dir ./data/raw
//!   cargo run --bin collector -- --dry-run

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use collector::{save_to_fs, FileSource, FtpConfig, FtpSource};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Downloads the state COVID-19 open-data file")]
struct Args {
    /// Directory for the raw copy (overrides RAW_FS_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Dry run - download but don't write to disk
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();
    let config = FtpConfig::from_env()?;

    println!("=== COVID-19 Collector ===");
    println!("Source: ftp://{}/{}", config.address(), config.file_name);

    let output_dir = args.output_dir.unwrap_or_else(|| config.raw_fs_dir.clone());
    let source = FtpSource::new(config);

    let artifact = source.fetch().await.context("Download failed")?;

    println!("  Downloaded: {} bytes", artifact.size_bytes());
    println!("  Hash: {}", artifact.content_hash);

    if args.dry_run {
        println!("  Dry run - nothing written");
        return Ok(());
    }

    let path = save_to_fs(&output_dir, &artifact)
        .await
        .context("Failed to save raw file")?;

    println!("  Saved to: {}", path.display());
    println!("\n=== Collection Complete ===");
    println!(
        "Ready for import: cargo run --bin importer -- --file {}",
        path.display()
    );

    Ok(())
}
