//! Summary store: where state summaries and their municipality aggregates live.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSummaryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};
use crate::model::{MunicipalitySummary, StateSummary, StoredSummary};

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Summary stored for exactly this publication date, if any. A missing
    /// date matches a summary stored without one.
    async fn find_by_publication(
        &self,
        publicacao: Option<DateTime<Utc>>,
    ) -> ImportResult<Option<StoredSummary>>;

    /// Summary with the most recent publication date. Summaries without a
    /// date rank below every dated one.
    async fn find_latest(&self) -> ImportResult<Option<StoredSummary>>;

    async fn find_municipalities(&self, summary_id: Uuid)
        -> ImportResult<Vec<MunicipalitySummary>>;

    /// Write the summary, then every municipality aggregate referencing it,
    /// as one unit. Returns `None` without writing anything when a summary for
    /// the same publication date already exists.
    async fn insert_run(
        &self,
        summary: &StateSummary,
        municipios: &[MunicipalitySummary],
    ) -> ImportResult<Option<StoredSummary>>;
}

/// Table names for the two logical collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub summary_table: String,
    pub municipality_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            summary_table: "resumos".to_string(),
            municipality_table: "municipios".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(
        summary_table: impl Into<String>,
        municipality_table: impl Into<String>,
    ) -> ImportResult<Self> {
        let config = Self {
            summary_table: summary_table.into(),
            municipality_table: municipality_table.into(),
        };
        validate_identifier(&config.summary_table)?;
        validate_identifier(&config.municipality_table)?;
        if config.summary_table == config.municipality_table {
            return Err(ImportError::Config(
                "summary and municipality tables must differ".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn from_env() -> ImportResult<Self> {
        let defaults = Self::default();
        Self::new(
            std::env::var("SUMMARY_TABLE").unwrap_or(defaults.summary_table),
            std::env::var("MUNICIPALITY_TABLE").unwrap_or(defaults.municipality_table),
        )
    }
}

/// Table names are spliced into SQL, so only plain identifiers are allowed.
fn validate_identifier(name: &str) -> ImportResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= 63;
    if valid {
        Ok(())
    } else {
        Err(ImportError::Config(format!("invalid table name: {name:?}")))
    }
}
