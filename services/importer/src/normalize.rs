//! Row normalization: untyped CSV row -> `CaseRecord`.
//!
//! Normalization never fails. Values that cannot be read degrade to `None`,
//! `false` or NaN field by field, and an unreadable municipality code lands
//! in the `UNKNOWN_IBGE_CODE` bucket.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::model::{CaseRecord, RawRow, UNKNOWN_IBGE_CODE};

const YES: &str = "SIM";
const HOSPITALIZED: &str = "INTERNADO";
const HOSPITALIZED_ICU: &str = "INTERNADO UTI";
const NULL_LITERAL: &str = "NULL";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

pub fn normalize_rows(rows: &[RawRow]) -> Vec<CaseRecord> {
    rows.iter().map(normalize_row).collect()
}

pub fn normalize_row(row: &RawRow) -> CaseRecord {
    let col = |name: &str| row.get(name).map(String::as_str);

    CaseRecord {
        publicacao: col("data_publicacao").and_then(parse_date),
        recuperado: parse_flag(col("recuperados"), YES),
        inicio_sintomas: col("data_inicio_sintomas").and_then(parse_date),
        coleta: col("data_coleta").and_then(parse_date),
        sintomas: parse_text(col("sintomas")),
        comorbidades: parse_text(col("comorbidades")),
        internado: parse_flag(col("internacao"), HOSPITALIZED),
        internado_uti: parse_flag(col("internacao_uti"), HOSPITALIZED_ICU),
        sexo: parse_text(col("sexo")),
        municipio: col("municipio").unwrap_or_default().to_string(),
        obito: parse_flag(col("obito"), YES),
        data_obito: col("data_obito").and_then(parse_date),
        idade: parse_number(col("idade")),
        data_resultado: col("data_resultado").and_then(parse_date),
        codigo_ibge: parse_ibge_code(col("codigo_ibge_municipio")),
        latitude: parse_number(col("latitude")),
        longitude: parse_number(col("longitude")),
        criterio_confirmacao: parse_text(col("criterio_confirmacao")),
        tipo_teste: parse_text(col("tipo_teste")),
        municipio_notificacao: parse_text(col("municipio_notificacao")),
        origem_esus: parse_flag(col("origem_esus"), YES),
        origem_sivep: parse_flag(col("origem_sivep"), YES),
        origem_lacen: parse_flag(col("origem_lacen"), YES),
        origem_laboratorio_privado: parse_flag(col("origem_laboratorio_privado"), YES),
        nome_laboratorio: parse_nullable_text(col("nom_laboratorio")),
        teste_rapido: parse_flag(col("fez_teste_rapido"), YES),
        pcr: parse_flag(col("fez_pcr"), YES),
        data_internacao: col("data_internacao").and_then(parse_date),
        data_entrada_uti: col("data_entrada_uti").and_then(parse_date),
        regional_saude: parse_text(col("regional_saude")),
        data_evolucao_caso: col("data_evolucao_caso").and_then(parse_date),
        data_saida_uti: col("data_saida_uti").and_then(parse_date),
        bairro: parse_text(col("bairro")),
    }
}

/// Parse a date or timestamp. Only instants strictly after the Unix epoch
/// are accepted; the upstream writes `1970-01-01` for "unknown".
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })?;

    (parsed.timestamp_millis() > 0).then_some(parsed)
}

/// Exact, case-sensitive comparison against the column's "true" marker.
pub fn parse_flag(raw: Option<&str>, sentinel: &str) -> bool {
    raw == Some(sentinel)
}

pub fn parse_number(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(f64::NAN)
}

/// Integer municipality code; anything unreadable maps to `UNKNOWN_IBGE_CODE`.
/// Integral decimals ("4205407.0") are accepted since spreadsheet exports
/// sometimes write the code that way.
pub fn parse_ibge_code(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN_IBGE_CODE;
    };

    if let Ok(code) = raw.parse::<i64>() {
        return code;
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 => {
            value as i64
        }
        _ => UNKNOWN_IBGE_CODE,
    }
}

pub fn parse_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::to_string)
}

/// Like `parse_text`, but the literal `NULL` also means "no value".
pub fn parse_nullable_text(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| *s != NULL_LITERAL).map(str::to_string)
}
