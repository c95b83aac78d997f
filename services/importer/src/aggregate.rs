use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{ImportError, ImportResult};
use crate::model::{publication_label, CaseRecord, MunicipalitySummary, StateSummary};

/// Partition records by IBGE code and count each group.
/// Using BTreeMap so groups come out in code order on every run.
pub fn group_by_municipality(records: Vec<CaseRecord>) -> Vec<MunicipalitySummary> {
    let mut groups: BTreeMap<i64, Vec<CaseRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.codigo_ibge).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(codigo_ibge, dados)| summarize_municipality(codigo_ibge, dados))
        .collect()
}

fn summarize_municipality(codigo_ibge: i64, dados: Vec<CaseRecord>) -> MunicipalitySummary {
    let count = |flag: fn(&CaseRecord) -> bool| dados.iter().filter(|d| flag(d)).count() as i64;

    MunicipalitySummary {
        // Name is taken from the first record; a code is assumed to carry one name.
        nome: dados
            .first()
            .map(|d| d.municipio.clone())
            .unwrap_or_default(),
        codigo_ibge,
        casos: dados.len() as i64,
        recuperados: count(|d| d.recuperado),
        internados: count(|d| d.internado),
        internados_uti: count(|d| d.internado_uti),
        obitos: count(|d| d.obito),
        dados,
    }
}

/// Publication date of the run, read from the first record.
///
/// Only an empty record sequence is an integrity failure. A first record
/// whose date could not be read yields `None`, and the run is stored under
/// that missing date. The file is expected to hold a single snapshot; when
/// records disagree the run is still labelled with the first record's date,
/// and the mismatch is logged.
pub fn publication_date(records: &[CaseRecord]) -> ImportResult<Option<DateTime<Utc>>> {
    let first = records
        .first()
        .ok_or_else(|| ImportError::data_integrity("the published file has no case records"))?;

    let publicacao = first.publicacao;
    if publicacao.is_none() {
        log::warn!("The first case record has no readable publication date");
    }

    let mismatched = records
        .iter()
        .filter(|r| r.publicacao != publicacao)
        .count();
    if mismatched > 0 {
        log::warn!(
            "{} of {} records are not dated {}; labelling the run with the first record's date",
            mismatched,
            records.len(),
            publication_label(publicacao)
        );
    }

    Ok(publicacao)
}

/// Fold municipality counts into the state-wide totals.
pub fn summarize_state(
    publicacao: Option<DateTime<Utc>>,
    municipios: &[MunicipalitySummary],
) -> StateSummary {
    StateSummary {
        publicacao,
        internados: municipios.iter().map(|m| m.internados).sum(),
        internados_uti: municipios.iter().map(|m| m.internados_uti).sum(),
        recuperados: municipios.iter().map(|m| m.recuperados).sum(),
        obitos: municipios.iter().map(|m| m.obitos).sum(),
        casos: municipios.iter().map(|m| m.casos).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawRow, UNKNOWN_IBGE_CODE};
    use crate::normalize::normalize_row;
    use chrono::TimeZone;

    fn record(pairs: &[(&str, &str)]) -> CaseRecord {
        let raw: RawRow = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        normalize_row(&raw)
    }

    fn scenario() -> Vec<CaseRecord> {
        vec![
            record(&[
                ("data_publicacao", "2020-06-01"),
                ("codigo_ibge_municipio", "8200300"),
                ("municipio", "BOA VISTA"),
                ("obito", "SIM"),
            ]),
            record(&[
                ("data_publicacao", "2020-06-01"),
                ("codigo_ibge_municipio", "8200300"),
                ("municipio", "BOA VISTA"),
                ("obito", "NAO"),
            ]),
            record(&[
                ("data_publicacao", "2020-06-01"),
                ("codigo_ibge_municipio", "ABC"),
                ("municipio", "IGNORADO"),
            ]),
        ]
    }

    #[test]
    fn test_groups_by_code_with_unknown_bucket() {
        let municipios = group_by_municipality(scenario());

        assert_eq!(municipios.len(), 2);
        assert_eq!(municipios[0].codigo_ibge, 8200300);
        assert_eq!(municipios[0].nome, "BOA VISTA");
        assert_eq!(municipios[0].casos, 2);
        assert_eq!(municipios[0].obitos, 1);
        assert_eq!(municipios[0].dados.len(), 2);
        assert_eq!(municipios[1].codigo_ibge, UNKNOWN_IBGE_CODE);
        assert_eq!(municipios[1].casos, 1);
        assert_eq!(municipios[1].obitos, 0);
    }

    #[test]
    fn test_state_totals_match_records() {
        let records = scenario();
        let total = records.len() as i64;
        let deaths = records.iter().filter(|r| r.obito).count() as i64;

        let publicacao = publication_date(&records).unwrap();
        let municipios = group_by_municipality(records);
        let resumo = summarize_state(publicacao, &municipios);

        assert_eq!(resumo.casos, total);
        assert_eq!(resumo.obitos, deaths);
        assert_eq!(resumo.casos, 3);
        assert_eq!(resumo.obitos, 1);
        assert_eq!(
            resumo.publicacao,
            Some(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_counts_every_flag() {
        let records = vec![
            record(&[
                ("codigo_ibge_municipio", "4205407"),
                ("recuperados", "SIM"),
                ("internacao", "INTERNADO"),
            ]),
            record(&[
                ("codigo_ibge_municipio", "4205407"),
                ("internacao", "INTERNADO"),
                ("internacao_uti", "INTERNADO UTI"),
            ]),
            record(&[("codigo_ibge_municipio", "4205407"), ("idade", "N/A")]),
        ];

        let municipios = group_by_municipality(records);
        let m = &municipios[0];
        assert_eq!(m.casos, 3);
        assert_eq!(m.recuperados, 1);
        assert_eq!(m.internados, 2);
        assert_eq!(m.internados_uti, 1);
        assert_eq!(m.obitos, 0);

        let resumo = summarize_state(Some(Utc::now()), &municipios);
        assert_eq!(resumo.internados, 2);
        assert_eq!(resumo.internados_uti, 1);
        assert_eq!(resumo.recuperados, 1);
    }

    #[test]
    fn test_group_empty_input() {
        assert!(group_by_municipality(Vec::new()).is_empty());
    }

    #[test]
    fn test_publication_date_empty_is_data_integrity_error() {
        let err = publication_date(&[]).unwrap_err();
        assert!(matches!(err, ImportError::DataIntegrity(_)));
        assert!(err.to_string().contains("não estão íntegros"));
    }

    #[test]
    fn test_publication_date_unreadable_on_first_record_is_none() {
        let records = vec![
            record(&[("data_publicacao", "IGNORADO")]),
            record(&[("data_publicacao", "2020-06-01")]),
        ];
        assert_eq!(publication_date(&records).unwrap(), None);

        let municipios = group_by_municipality(records);
        let resumo = summarize_state(None, &municipios);
        assert_eq!(resumo.publicacao, None);
        assert_eq!(resumo.casos, 2);
    }

    #[test]
    fn test_publication_date_uses_first_record_when_mixed() {
        let records = vec![
            record(&[("data_publicacao", "2020-06-02")]),
            record(&[("data_publicacao", "2020-06-01")]),
        ];
        let publicacao = publication_date(&records).unwrap();
        assert_eq!(
            publicacao,
            Some(Utc.with_ymd_and_hms(2020, 6, 2, 0, 0, 0).unwrap())
        );
    }
}
