use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreConfig, SummaryStore};
use crate::error::ImportResult;
use crate::model::{CaseRecord, MunicipalitySummary, StateSummary, StoredSummary};

const SUMMARY_COLUMNS: &str =
    "resumo_id, publicacao, internados, internados_uti, recuperados, obitos, casos";

/// Summary row from database
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    resumo_id: Uuid,
    publicacao: Option<DateTime<Utc>>,
    internados: i64,
    internados_uti: i64,
    recuperados: i64,
    obitos: i64,
    casos: i64,
}

impl From<SummaryRow> for StoredSummary {
    fn from(row: SummaryRow) -> Self {
        StoredSummary {
            id: row.resumo_id,
            summary: StateSummary {
                publicacao: row.publicacao,
                internados: row.internados,
                internados_uti: row.internados_uti,
                recuperados: row.recuperados,
                obitos: row.obitos,
                casos: row.casos,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MunicipalityRow {
    codigo_ibge: i64,
    nome: String,
    casos: i64,
    recuperados: i64,
    internados: i64,
    internados_uti: i64,
    obitos: i64,
    dados: Json<Vec<CaseRecord>>,
}

impl From<MunicipalityRow> for MunicipalitySummary {
    fn from(row: MunicipalityRow) -> Self {
        MunicipalitySummary {
            nome: row.nome,
            codigo_ibge: row.codigo_ibge,
            casos: row.casos,
            recuperados: row.recuperados,
            internados: row.internados,
            internados_uti: row.internados_uti,
            obitos: row.obitos,
            dados: row.dados.0,
        }
    }
}

pub struct PgSummaryStore {
    pool: PgPool,
    tables: StoreConfig,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool, tables: StoreConfig) -> Self {
        Self { pool, tables }
    }

    pub async fn connect(db_url: &str, tables: StoreConfig) -> ImportResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool, tables))
    }

    /// Create both tables if they are missing. The unique constraint on
    /// `publicacao` is what makes concurrent imports of one snapshot safe.
    /// It treats NULLs as equal, so an undated run is also stored once
    /// (requires PostgreSQL 15 or later).
    pub async fn ensure_schema(&self) -> ImportResult<()> {
        let ddl = schema_sql(&self.tables);
        sqlx::raw_sql(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

fn schema_sql(tables: &StoreConfig) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {resumos} (
            resumo_id UUID PRIMARY KEY,
            publicacao TIMESTAMPTZ UNIQUE NULLS NOT DISTINCT,
            internados BIGINT NOT NULL,
            internados_uti BIGINT NOT NULL,
            recuperados BIGINT NOT NULL,
            obitos BIGINT NOT NULL,
            casos BIGINT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        CREATE TABLE IF NOT EXISTS {municipios} (
            municipio_id UUID PRIMARY KEY,
            resumo_id UUID NOT NULL REFERENCES {resumos} (resumo_id) ON DELETE CASCADE,
            codigo_ibge BIGINT NOT NULL,
            nome TEXT NOT NULL,
            casos BIGINT NOT NULL,
            recuperados BIGINT NOT NULL,
            internados BIGINT NOT NULL,
            internados_uti BIGINT NOT NULL,
            obitos BIGINT NOT NULL,
            dados JSONB NOT NULL,
            UNIQUE (resumo_id, codigo_ibge)
        );
        "#,
        resumos = tables.summary_table,
        municipios = tables.municipality_table,
    )
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn find_by_publication(
        &self,
        publicacao: Option<DateTime<Utc>>,
    ) -> ImportResult<Option<StoredSummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM {} WHERE publicacao IS NOT DISTINCT FROM $1",
            self.tables.summary_table
        );
        let row: Option<SummaryRow> = sqlx::query_as(&sql)
            .bind(publicacao)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredSummary::from))
    }

    async fn find_latest(&self) -> ImportResult<Option<StoredSummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM {} ORDER BY publicacao DESC NULLS LAST LIMIT 1",
            self.tables.summary_table
        );
        let row: Option<SummaryRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        Ok(row.map(StoredSummary::from))
    }

    async fn find_municipalities(
        &self,
        summary_id: Uuid,
    ) -> ImportResult<Vec<MunicipalitySummary>> {
        let sql = format!(
            r#"
            SELECT codigo_ibge, nome, casos, recuperados, internados, internados_uti, obitos, dados
            FROM {}
            WHERE resumo_id = $1
            ORDER BY codigo_ibge
            "#,
            self.tables.municipality_table
        );
        let rows: Vec<MunicipalityRow> = sqlx::query_as(&sql)
            .bind(summary_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MunicipalitySummary::from).collect())
    }

    async fn insert_run(
        &self,
        summary: &StateSummary,
        municipios: &[MunicipalitySummary],
    ) -> ImportResult<Option<StoredSummary>> {
        let insert_summary = format!(
            r#"
            INSERT INTO {}
            ({SUMMARY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (publicacao) DO NOTHING
            RETURNING {SUMMARY_COLUMNS}
            "#,
            self.tables.summary_table
        );
        let insert_municipio = format!(
            r#"
            INSERT INTO {}
            (municipio_id, resumo_id, codigo_ibge, nome, casos, recuperados, internados, internados_uti, obitos, dados)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            self.tables.municipality_table
        );

        let mut tx = self.pool.begin().await?;

        let inserted: Option<SummaryRow> = sqlx::query_as(&insert_summary)
            .bind(Uuid::new_v4())
            .bind(summary.publicacao)
            .bind(summary.internados)
            .bind(summary.internados_uti)
            .bind(summary.recuperados)
            .bind(summary.obitos)
            .bind(summary.casos)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        for municipio in municipios {
            let dados = serde_json::to_value(&municipio.dados)?;
            sqlx::query(&insert_municipio)
                .bind(Uuid::new_v4())
                .bind(row.resumo_id)
                .bind(municipio.codigo_ibge)
                .bind(&municipio.nome)
                .bind(municipio.casos)
                .bind(municipio.recuperados)
                .bind(municipio.internados)
                .bind(municipio.internados_uti)
                .bind(municipio.obitos)
                .bind(dados)
                .execute(&mut *tx)
                .await?;
            log::debug!("Saved {} ({})", municipio.nome, municipio.codigo_ibge);
        }

        tx.commit().await?;

        Ok(Some(StoredSummary::from(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schema_uses_configured_tables() {
        let tables = StoreConfig::new("resumos_sc", "municipios_sc").unwrap();
        let ddl = schema_sql(&tables);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS resumos_sc"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS municipios_sc"));
        assert!(ddl.contains("REFERENCES resumos_sc (resumo_id)"));
    }

    #[test]
    fn test_schema_makes_publication_unique() {
        let ddl = schema_sql(&StoreConfig::default());
        assert!(ddl.contains("publicacao TIMESTAMPTZ UNIQUE NULLS NOT DISTINCT"));
        assert!(!ddl.contains("publicacao TIMESTAMPTZ NOT NULL"));
    }

    // ---------------------------------------------------------------------
    // Live database
    // ---------------------------------------------------------------------

    fn summary(publicacao: Option<DateTime<Utc>>, casos: i64) -> StateSummary {
        StateSummary {
            publicacao,
            internados: 1,
            internados_uti: 0,
            recuperados: 2,
            obitos: 1,
            casos,
        }
    }

    fn municipio(codigo_ibge: i64, casos: i64) -> MunicipalitySummary {
        MunicipalitySummary {
            nome: format!("M{codigo_ibge}"),
            codigo_ibge,
            casos,
            recuperados: 1,
            internados: 0,
            internados_uti: 0,
            obitos: 0,
            dados: Vec::new(),
        }
    }

    /// Needs PostgreSQL 15+ at DB_URL: `DB_URL=... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_insert_run_against_database() {
        dotenvy::dotenv().ok();
        let db_url = std::env::var("DB_URL").expect("DB_URL must be set for this test");

        let suffix = std::process::id();
        let tables = StoreConfig::new(
            format!("resumos_test_{suffix}"),
            format!("municipios_test_{suffix}"),
        )
        .unwrap();
        let store = PgSummaryStore::connect(&db_url, tables.clone()).await.unwrap();
        store.ensure_schema().await.unwrap();

        let dated = Some(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap());
        let first = store
            .insert_run(&summary(dated, 3), &[municipio(8200300, 2), municipio(9999999, 1)])
            .await
            .unwrap()
            .expect("first insert writes the summary");
        let second = store
            .insert_run(&summary(dated, 99), &[municipio(4205407, 99)])
            .await
            .unwrap();
        assert!(second.is_none());

        let found = store.find_by_publication(dated).await.unwrap();
        assert_eq!(found, Some(first.clone()));
        let municipios = store.find_municipalities(first.id).await.unwrap();
        assert_eq!(municipios.len(), 2);
        assert_eq!(municipios[0].codigo_ibge, 8200300);
        assert_eq!(municipios[0].casos, 2);

        // Undated runs: NULL compares equal, and ranks below dated ones.
        assert!(store.find_by_publication(None).await.unwrap().is_none());
        let undated = store
            .insert_run(&summary(None, 5), &[municipio(8200300, 5)])
            .await
            .unwrap();
        assert!(undated.is_some());
        assert!(store
            .insert_run(&summary(None, 5), &[municipio(8200300, 5)])
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.find_by_publication(None).await.unwrap(), undated);

        let latest = store.find_latest().await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);

        let cleanup = format!(
            "DROP TABLE {}; DROP TABLE {};",
            tables.municipality_table, tables.summary_table
        );
        sqlx::raw_sql(&cleanup).execute(&store.pool).await.unwrap();
    }
}
