use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One CSV data row: column name -> trimmed value.
pub type RawRow = HashMap<String, String>;

/// Municipality code used for every record whose IBGE code cannot be read.
pub const UNKNOWN_IBGE_CODE: i64 = 9_999_999;

/// A single case record from the state bulletin, with typed fields.
///
/// Numeric fields hold NaN when the source value is missing or not a
/// number; NaN travels as JSON `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub publicacao: Option<DateTime<Utc>>,
    pub recuperado: bool,
    pub inicio_sintomas: Option<DateTime<Utc>>,
    pub coleta: Option<DateTime<Utc>>,
    pub sintomas: Option<String>,
    pub comorbidades: Option<String>,
    pub internado: bool,
    pub internado_uti: bool,
    pub sexo: Option<String>,
    pub municipio: String,
    pub obito: bool,
    pub data_obito: Option<DateTime<Utc>>,
    #[serde(with = "nan_as_null")]
    pub idade: f64,
    pub data_resultado: Option<DateTime<Utc>>,
    pub codigo_ibge: i64,
    #[serde(with = "nan_as_null")]
    pub latitude: f64,
    #[serde(with = "nan_as_null")]
    pub longitude: f64,
    pub criterio_confirmacao: Option<String>,
    pub tipo_teste: Option<String>,
    pub municipio_notificacao: Option<String>,
    pub origem_esus: bool,
    pub origem_sivep: bool,
    pub origem_lacen: bool,
    pub origem_laboratorio_privado: bool,
    pub nome_laboratorio: Option<String>,
    pub teste_rapido: bool,
    pub pcr: bool,
    pub data_internacao: Option<DateTime<Utc>>,
    pub data_entrada_uti: Option<DateTime<Utc>>,
    pub regional_saude: Option<String>,
    pub data_evolucao_caso: Option<DateTime<Utc>>,
    pub data_saida_uti: Option<DateTime<Utc>>,
    pub bairro: Option<String>,
}

/// Case counts for one municipality, plus the records they were counted from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalitySummary {
    pub nome: String,
    pub codigo_ibge: i64,
    pub casos: i64,
    pub recuperados: i64,
    pub internados: i64,
    pub internados_uti: i64,
    pub obitos: i64,
    pub dados: Vec<CaseRecord>,
}

/// State-wide totals for one publication of the bulletin.
///
/// `publicacao` is `None` when the first record's publication date could not
/// be read. Such a run is still stored once, keyed on the missing date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub publicacao: Option<DateTime<Utc>>,
    pub internados: i64,
    pub internados_uti: i64,
    pub recuperados: i64,
    pub obitos: i64,
    pub casos: i64,
}

/// A state summary as persisted, with its generated identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub summary: StateSummary,
}

/// Publication date as shown in logs and CLI output.
pub fn publication_label(publicacao: Option<DateTime<Utc>>) -> String {
    match publicacao {
        Some(date) => date.to_rfc3339(),
        None => "(sem data)".to_string(),
    }
}

/// Latest stored summary together with its municipality aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct LatestResults {
    #[serde(flatten)]
    pub resumo: StoredSummary,
    pub dados: Vec<MunicipalitySummary>,
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
