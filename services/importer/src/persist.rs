use crate::error::ImportResult;
use crate::model::{publication_label, MunicipalitySummary, StateSummary, StoredSummary};
use crate::store::SummaryStore;

/// Store one run's summary and municipality aggregates unless that
/// publication date is already stored.
///
/// Returns `None` when nothing was written: the date was present before the
/// run started, or a concurrent run stored it first.
pub async fn persist_run(
    store: &dyn SummaryStore,
    summary: &StateSummary,
    municipios: &[MunicipalitySummary],
) -> ImportResult<Option<StoredSummary>> {
    if let Some(existing) = store.find_by_publication(summary.publicacao).await? {
        log::info!(
            "Publication {} already stored as {}, nothing saved",
            publication_label(summary.publicacao),
            existing.id
        );
        return Ok(None);
    }

    log::info!(
        "Saving summary for {} with {} municipalities...",
        publication_label(summary.publicacao),
        municipios.len()
    );

    let stored = store.insert_run(summary, municipios).await?;
    match &stored {
        Some(s) => log::info!("Saved summary {}", s.id),
        None => log::warn!(
            "Publication {} was stored by a concurrent import, nothing saved",
            publication_label(summary.publicacao)
        ),
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    /// Store whose summary INSERT always fails.
    struct FailingStore;

    #[async_trait]
    impl SummaryStore for FailingStore {
        async fn find_by_publication(
            &self,
            _publicacao: Option<DateTime<Utc>>,
        ) -> ImportResult<Option<StoredSummary>> {
            Ok(None)
        }

        async fn find_latest(&self) -> ImportResult<Option<StoredSummary>> {
            Ok(None)
        }

        async fn find_municipalities(
            &self,
            _summary_id: Uuid,
        ) -> ImportResult<Vec<MunicipalitySummary>> {
            Ok(Vec::new())
        }

        async fn insert_run(
            &self,
            _summary: &StateSummary,
            _municipios: &[MunicipalitySummary],
        ) -> ImportResult<Option<StoredSummary>> {
            Err(ImportError::Store(sqlx::Error::PoolTimedOut))
        }
    }

    fn summary() -> StateSummary {
        StateSummary {
            publicacao: Some(Utc.with_ymd_and_hms(2020, 7, 10, 0, 0, 0).unwrap()),
            internados: 4,
            internados_uti: 1,
            recuperados: 10,
            obitos: 2,
            casos: 30,
        }
    }

    fn municipios() -> Vec<MunicipalitySummary> {
        [4205407, 4209102]
            .into_iter()
            .map(|codigo_ibge| MunicipalitySummary {
                nome: format!("M{codigo_ibge}"),
                codigo_ibge,
                casos: 15,
                recuperados: 5,
                internados: 2,
                internados_uti: 0,
                obitos: 1,
                dados: Vec::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_persist_writes_summary_and_municipalities() {
        let store = MemoryStore::new();
        let stored = persist_run(&store, &summary(), &municipios())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.summary, summary());
        assert_eq!(store.summary_count(), 1);
        assert_eq!(store.municipality_count(), 2);
        assert_eq!(store.find_municipalities(stored.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persist_twice_is_a_no_op() {
        let store = MemoryStore::new();
        persist_run(&store, &summary(), &municipios()).await.unwrap();
        let second = persist_run(&store, &summary(), &municipios()).await.unwrap();

        assert!(second.is_none());
        assert_eq!(store.summary_count(), 1);
        assert_eq!(store.municipality_count(), 2);
    }

    #[tokio::test]
    async fn test_persist_other_publication_is_written() {
        let store = MemoryStore::new();
        persist_run(&store, &summary(), &municipios()).await.unwrap();

        let mut next = summary();
        next.publicacao = Some(Utc.with_ymd_and_hms(2020, 7, 11, 0, 0, 0).unwrap());
        let stored = persist_run(&store, &next, &municipios()).await.unwrap();

        assert!(stored.is_some());
        assert_eq!(store.summary_count(), 2);
        assert_eq!(store.municipality_count(), 4);
    }

    #[tokio::test]
    async fn test_persist_failed_summary_write_is_store_error() {
        let err = persist_run(&FailingStore, &summary(), &municipios())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Store(_)));
        assert!(!err.is_bad_data());
    }
}
