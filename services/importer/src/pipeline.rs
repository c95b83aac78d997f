//! The import run: fetch -> read -> normalize -> aggregate -> persist.
//!
//! Steps run strictly one after another. The whole file is parsed before a
//! single record is normalized, and nothing is written unless every earlier
//! step succeeded.

use std::path::Path;

use chrono::{DateTime, Utc};
use collector::{save_to_fs, FileSource};
use serde::Serialize;

use crate::aggregate::{group_by_municipality, publication_date, summarize_state};
use crate::error::ImportResult;
use crate::model::{publication_label, MunicipalitySummary, StateSummary, StoredSummary};
use crate::normalize::normalize_rows;
use crate::persist::persist_run;
use crate::reader::read_rows;
use crate::store::SummaryStore;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported(StoredSummary),
    AlreadyImported { publicacao: Option<DateTime<Utc>> },
}

/// Aggregates computed from one file, not yet stored.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub summary: StateSummary,
    pub municipios: Vec<MunicipalitySummary>,
}

/// Download the published file and import it.
///
/// With `raw_dir` set, the downloaded bytes are written there before parsing
/// starts; a failed write aborts the run.
pub async fn import_data(
    source: &dyn FileSource,
    store: &dyn SummaryStore,
    raw_dir: Option<&Path>,
) -> ImportResult<ImportOutcome> {
    let artifact = source.fetch().await?;
    log::info!(
        "Fetched {} ({} bytes, {})",
        artifact.file_name,
        artifact.size_bytes(),
        artifact.content_hash
    );

    if let Some(dir) = raw_dir {
        let path = save_to_fs(dir, &artifact).await?;
        log::info!("Saved raw copy to {}", path.display());
    }

    import_bytes(&artifact.bytes, store).await
}

/// Import a file that is already in memory.
pub async fn import_bytes(bytes: &[u8], store: &dyn SummaryStore) -> ImportResult<ImportOutcome> {
    let prepared = prepare_run(bytes)?;
    let publicacao = prepared.summary.publicacao;

    let outcome = match persist_run(store, &prepared.summary, &prepared.municipios).await? {
        Some(stored) => ImportOutcome::Imported(stored),
        None => ImportOutcome::AlreadyImported { publicacao },
    };

    Ok(outcome)
}

/// Everything up to, but not including, persistence.
pub fn prepare_run(bytes: &[u8]) -> ImportResult<PreparedRun> {
    let rows = read_rows(bytes)?;
    let records = normalize_rows(&rows);
    drop(rows);

    let publicacao = publication_date(&records)?;
    let municipios = group_by_municipality(records);
    let summary = summarize_state(publicacao, &municipios);

    log::info!(
        "Publication {}: {} cases in {} municipalities",
        publication_label(publicacao),
        summary.casos,
        municipios.len()
    );

    Ok(PreparedRun {
        summary,
        municipios,
    })
}
