//! Delimited-text adapter: turns an in-memory CSV export into a `SourceTable`.

use crate::error::ReconError;
use crate::model::{CellValue, RawRow, SourceTable, TableSpec};

/// Parse CSV text with a header row. The delimiter is sniffed from the
/// first lines. Short rows are padded with empty cells; rows with every
/// cell blank are dropped.
pub fn table_from_csv(spec: TableSpec, csv_data: &str) -> Result<SourceTable, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(csv_data))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let row: RawRow = columns
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), CellValue::from(record.get(idx).unwrap_or(""))))
            .collect();
        if row.values().all(CellValue::is_blank) {
            continue;
        }
        rows.push(row);
    }

    log::debug!(
        "table '{}': {} columns, {} rows",
        spec.source_tag,
        columns.len(),
        rows.len()
    );
    Ok(SourceTable { spec, columns, rows })
}

/// Pick the delimiter giving the most consistent multi-field split over the
/// first lines. Falls back to comma.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b';', b',', b'\t', b'|'];
    let sample: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            break;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}
