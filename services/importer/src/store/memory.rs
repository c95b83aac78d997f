use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::SummaryStore;
use crate::error::ImportResult;
use crate::model::{MunicipalitySummary, StateSummary, StoredSummary};

/// In-process store with the same semantics as the Postgres one.
/// Backs `--dry-run` imports and the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    summaries: Vec<StoredSummary>,
    municipalities: Vec<(Uuid, MunicipalitySummary)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary_count(&self) -> usize {
        self.state().summaries.len()
    }

    pub fn municipality_count(&self) -> usize {
        self.state().municipalities.len()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn find_by_publication(
        &self,
        publicacao: Option<DateTime<Utc>>,
    ) -> ImportResult<Option<StoredSummary>> {
        Ok(self
            .state()
            .summaries
            .iter()
            .find(|s| s.summary.publicacao == publicacao)
            .cloned())
    }

    async fn find_latest(&self) -> ImportResult<Option<StoredSummary>> {
        Ok(self
            .state()
            .summaries
            .iter()
            .max_by_key(|s| s.summary.publicacao)
            .cloned())
    }

    async fn find_municipalities(
        &self,
        summary_id: Uuid,
    ) -> ImportResult<Vec<MunicipalitySummary>> {
        Ok(self
            .state()
            .municipalities
            .iter()
            .filter(|(id, _)| *id == summary_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn insert_run(
        &self,
        summary: &StateSummary,
        municipios: &[MunicipalitySummary],
    ) -> ImportResult<Option<StoredSummary>> {
        let mut state = self.state();
        if state
            .summaries
            .iter()
            .any(|s| s.summary.publicacao == summary.publicacao)
        {
            return Ok(None);
        }

        let stored = StoredSummary {
            id: Uuid::new_v4(),
            summary: summary.clone(),
        };
        state.summaries.push(stored.clone());
        state
            .municipalities
            .extend(municipios.iter().map(|m| (stored.id, m.clone())));

        Ok(Some(stored))
    }
}
