//! Importer Service - Loads the state COVID-19 bulletin into the summary store
//!
//! Usage:
//!   # Download from the state FTP and import:
//!   cargo run --bin importer
//!
//!   # Import a file fetched earlier by the collector:
//!   cargo run --bin importer -- --file ./data/raw/20200601T120000Z-boavista_covid_dados_abertos.csv
//!
//!   # See what would be stored without touching the database:
//!   cargo run --bin importer -- --file dados.csv --dry-run
//!
//!   # Print the latest stored results:
//!   cargo run --bin importer -- --show

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use collector::{save_to_fs, FileSource, FtpConfig, FtpSource};
use importer::{
    import_bytes, latest_results, publication_label, ImportOutcome, MemoryStore, PgSummaryStore,
    StoreConfig, SummaryStore,
};
use tokio::fs;

#[derive(Parser, Debug)]
#[command(name = "importer", about = "Imports the state COVID-19 bulletin")]
struct Args {
    /// Local CSV to import instead of downloading
    #[arg(long)]
    file: Option<PathBuf>,

    /// Dry run - aggregate in memory, don't save to database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Print the latest stored results and exit
    #[arg(long, default_value = "false", conflicts_with_all = ["file", "dry_run"])]
    show: bool,
}

async fn connect_store() -> Result<PgSummaryStore> {
    let db_url = std::env::var("DB_URL").context("DB_URL env var missing")?;
    let tables = StoreConfig::from_env()?;

    let store = PgSummaryStore::connect(&db_url, tables)
        .await
        .context("Failed to connect to database")?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare summary tables")?;

    Ok(store)
}

async fn show_latest(store: &dyn SummaryStore) -> Result<()> {
    match latest_results(store).await? {
        Some(results) => {
            println!(
                "Publication: {}",
                publication_label(results.resumo.summary.publicacao)
            );
            println!("Summary ID: {}", results.resumo.id);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        None => println!("No results stored yet"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    println!("=== COVID-19 Importer ===");

    if args.show {
        let store = connect_store().await?;
        return show_latest(&store).await;
    }

    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let bytes = match &args.file {
        Some(path) => {
            println!("Reading file: {}", path.display());
            fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let config = FtpConfig::from_env()?;
            println!("Downloading ftp://{}/{}", config.address(), config.file_name);
            let source = FtpSource::new(config);
            let artifact = source.fetch().await.context("Download failed")?;
            println!("Hash: {}", artifact.content_hash);
            if !args.dry_run {
                let path = save_to_fs(&source.config().raw_fs_dir, &artifact)
                    .await
                    .context("Failed to save raw copy")?;
                println!("Raw copy: {}", path.display());
            }
            artifact.bytes
        }
    };
    println!("Content size: {} bytes", bytes.len());

    let store: Box<dyn SummaryStore> = if args.dry_run {
        Box::new(MemoryStore::new())
    } else {
        Box::new(connect_store().await?)
    };

    let outcome = import_bytes(&bytes, store.as_ref()).await?;

    match outcome {
        ImportOutcome::Imported(stored) => {
            let resumo = &stored.summary;
            println!("\n=== Import Complete ===");
            println!("Publication: {}", publication_label(resumo.publicacao));
            println!("Cases: {}", resumo.casos);
            println!("Recovered: {}", resumo.recuperados);
            println!("Hospitalized: {} (ICU: {})", resumo.internados, resumo.internados_uti);
            println!("Deaths: {}", resumo.obitos);
            if args.dry_run {
                println!("Dry run - nothing saved to database");
            } else {
                println!("Summary ID: {}", stored.id);
            }
        }
        ImportOutcome::AlreadyImported { publicacao } => {
            println!(
                "\nPublication {} already imported. Nothing saved.",
                publication_label(publicacao)
            );
        }
    }

    Ok(())
}
