use crate::classify::{classify_label, MovementClassifier};
use crate::error::{RejectReason, RowRejection};
use crate::model::{
    CellValue, ColumnMapping, Direction, KeySource, MovementRecord, RawRow, Record, Role,
    SnapshotRecord, TableKind, TableSpec,
};

/// Turns raw rows into typed records using a table's column mapping.
pub struct RecordNormalizer<'a> {
    classifier: &'a MovementClassifier,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(classifier: &'a MovementClassifier) -> Self {
        Self { classifier }
    }

    /// Normalize one row. Usually yields one record; a movement row with
    /// split inbound/outbound columns yields one per non-blank cell.
    pub fn normalize(
        &self,
        row: &RawRow,
        row_index: usize,
        mapping: &ColumnMapping,
        spec: &TableSpec,
    ) -> Result<Vec<Record>, RowRejection> {
        let reject = |reason: RejectReason| RowRejection {
            source_tag: spec.source_tag.clone(),
            row: row_index,
            reason,
        };

        let product_name = text(row, mapping, Role::Name)
            .filter(|s| !is_null_marker(s))
            .map(|s| collapse_whitespace(&s));

        // Without an identifier column the name is the key.
        let by_name = spec.key == KeySource::Name || !mapping.has(Role::Identifier);
        let product_key = if by_name {
            product_name.as_ref().map(|s| s.to_lowercase())
        } else {
            text(row, mapping, Role::Identifier)
                .filter(|s| !is_null_marker(s))
                .map(|s| collapse_whitespace(&s).to_uppercase())
        }
        .ok_or_else(|| reject(RejectReason::BlankKey))?;

        match &spec.kind {
            TableKind::Snapshot { period } => {
                let quantity = quantity(row, mapping, Role::Quantity)
                    .map_err(reject)?
                    .ok_or_else(|| reject(RejectReason::MissingQuantity))?;
                Ok(vec![Record::Snapshot(SnapshotRecord {
                    product_key,
                    product_name,
                    quantity,
                    period: period.clone(),
                    source_tag: spec.source_tag.clone(),
                })])
            }
            TableKind::Movement => {
                let operation_code = text(row, mapping, Role::OperationCode);
                let use_split = mapping.has_split_quantities()
                    && (!mapping.has(Role::OperationCode) || !mapping.has(Role::Quantity));

                let movement = |quantity: f64, direction: Direction, value: Option<f64>| {
                    Record::Movement(MovementRecord {
                        product_key: product_key.clone(),
                        product_name: product_name.clone(),
                        quantity,
                        direction,
                        source_tag: spec.source_tag.clone(),
                        operation_code: operation_code.clone(),
                        value,
                    })
                };

                if use_split {
                    let inbound = quantity(row, mapping, Role::InboundQuantity).map_err(reject)?;
                    let outbound = quantity(row, mapping, Role::OutboundQuantity).map_err(reject)?;
                    if inbound.is_none() && outbound.is_none() {
                        return Err(reject(RejectReason::MissingQuantity));
                    }
                    let mut records = Vec::with_capacity(2);
                    if let Some(q) = inbound {
                        records.push(movement(q, Direction::Inbound, None));
                    }
                    if let Some(q) = outbound {
                        records.push(movement(q, Direction::Outbound, None));
                    }
                    return Ok(records);
                }

                let quantity = quantity(row, mapping, Role::Quantity)
                    .map_err(reject)?
                    .ok_or_else(|| reject(RejectReason::MissingQuantity))?;
                let direction = self.direction(row, mapping, operation_code.as_deref());
                let value = text(row, mapping, Role::Value).and_then(|raw| {
                    let parsed = parse_decimal(raw.trim_start_matches("R$").trim_start_matches('$'))
                        .filter(|v| *v >= 0.0);
                    if parsed.is_none() {
                        log::debug!(
                            "table '{}', row {row_index}: ignoring value '{raw}'",
                            spec.source_tag
                        );
                    }
                    parsed
                });
                Ok(vec![movement(quantity, direction, value)])
            }
        }
    }

    fn direction(&self, row: &RawRow, mapping: &ColumnMapping, code: Option<&str>) -> Direction {
        let by_code = code.map_or(Direction::Unknown, |c| self.classifier.classify(c));
        if by_code != Direction::Unknown {
            return by_code;
        }
        text(row, mapping, Role::Direction).map_or(Direction::Unknown, |l| classify_label(&l))
    }
}

/// Trimmed, non-empty text of the cell mapped to `role`.
fn text(row: &RawRow, mapping: &ColumnMapping, role: Role) -> Option<String> {
    let cell = row.get(mapping.get(role)?)?;
    let s = cell.as_text();
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `Ok(None)` when the column is unmapped or the cell blank.
fn quantity(row: &RawRow, mapping: &ColumnMapping, role: Role) -> Result<Option<f64>, RejectReason> {
    let Some(cell) = mapping.get(role).and_then(|col| row.get(col)) else {
        return Ok(None);
    };
    if cell.is_blank() {
        return Ok(None);
    }
    parse_quantity(cell).map(Some)
}

/// Parse a non-negative quantity from a cell.
pub fn parse_quantity(cell: &CellValue) -> Result<f64, RejectReason> {
    let raw = cell.as_text();
    let value = match cell {
        CellValue::Number(n) => Some(*n),
        _ => parse_decimal(&raw),
    };
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v.abs()),
        _ => Err(RejectReason::UnparseableQuantity(raw.trim().to_string())),
    }
}

/// Parse a decimal written with `,` or `.` as the decimal separator.
///
/// - one separator kind, once: decimal separator (`1,5`, `1.5`)
/// - one separator kind, repeated: thousands separator in 3-digit groups (`1.234.567`)
/// - both kinds: the rightmost is the decimal separator and appears once; the
///   other must form 3-digit groups (`1.234,56`, `1,234.56`)
///
/// Anything else is ambiguous and yields `None`.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) => body.to_string(),
        (1, 0) => decimal_only(body, '.')?,
        (0, 1) => decimal_only(body, ',')?,
        (_, 0) => grouped(body, '.')?,
        (0, _) => grouped(body, ',')?,
        _ => {
            let decimal_at = body.rfind(|c: char| c == '.' || c == ',')?;
            let decimal_sep = body[decimal_at..].chars().next()?;
            let thousands_sep = if decimal_sep == '.' { ',' } else { '.' };
            let (int_part, frac_part) = (&body[..decimal_at], &body[decimal_at + 1..]);
            if int_part.contains(decimal_sep) || !all_digits(frac_part) {
                return None;
            }
            format!("{}.{frac_part}", grouped(int_part, thousands_sep)?)
        }
    };

    let value: f64 = canonical.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn decimal_only(body: &str, sep: char) -> Option<String> {
    let (int_part, frac_part) = body.split_once(sep)?;
    (all_digits(int_part) && all_digits(frac_part)).then(|| format!("{int_part}.{frac_part}"))
}

/// Strip a thousands separator, requiring `d{1,3}(sep d{3})*`.
fn grouped(body: &str, sep: char) -> Option<String> {
    let mut groups = body.split(sep);
    let head = groups.next()?;
    if !all_digits(head) || head.len() > 3 {
        return None;
    }
    let mut out = head.to_string();
    for group in groups {
        if group.len() != 3 || !all_digits(group) {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_null_marker(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "" | "nan" | "null" | "none")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
