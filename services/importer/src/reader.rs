use std::borrow::Cow;

use crate::error::{ImportError, ImportResult};
use crate::model::RawRow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode the raw file. The bulletin is normally UTF-8, but older snapshots
/// were exported as Windows-1252.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            log::warn!("File is not valid UTF-8, decoding as Windows-1252");
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// Parse the whole semicolon-separated file into rows keyed by header.
///
/// Every row must have as many fields as the header; anything else aborts
/// the run.
pub fn read_rows(bytes: &[u8]) -> ImportResult<Vec<RawRow>> {
    let content = decode(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| parse_error(e, 1))?
        .clone();

    let mut rows = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_error(e, line_idx as u64 + 2))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    log::info!("Read {} rows ({} columns)", rows.len(), headers.len());
    Ok(rows)
}

fn parse_error(error: csv::Error, fallback_line: u64) -> ImportError {
    let line = error
        .position()
        .map(|position| position.line())
        .unwrap_or(fallback_line);
    ImportError::Parse {
        line,
        message: error.to_string(),
    }
}
