use crate::error::ImportResult;
use crate::model::LatestResults;
use crate::store::SummaryStore;

/// Most recently published summary with its municipality aggregates.
/// `None` when nothing was ever imported.
pub async fn latest_results(store: &dyn SummaryStore) -> ImportResult<Option<LatestResults>> {
    let Some(resumo) = store.find_latest().await? else {
        return Ok(None);
    };

    let dados = store.find_municipalities(resumo.id).await?;
    Ok(Some(LatestResults { resumo, dados }))
}
