//! Importer - turns the state COVID-19 bulletin into stored summaries
//!
//! Responsibilities:
//! - Read the semicolon-separated bulletin into rows
//! - Normalize each row into a typed case record
//! - Aggregate records per municipality and state-wide
//! - Store one summary per publication date, never twice
//! - Serve the most recent summary back

pub mod aggregate;
pub mod error;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod reader;
pub mod results;
pub mod store;

pub use error::{ImportError, ImportResult};
pub use model::{
    publication_label, CaseRecord, LatestResults, MunicipalitySummary, RawRow, StateSummary,
    StoredSummary, UNKNOWN_IBGE_CODE,
};
pub use pipeline::{import_bytes, import_data, prepare_run, ImportOutcome, PreparedRun};
pub use results::latest_results;
pub use store::{MemoryStore, PgSummaryStore, StoreConfig, SummaryStore};
