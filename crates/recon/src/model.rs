use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{DataQualityWarning, RowRejection};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One cell as handed over by an extraction collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Text rendering. Integral numbers drop the fractional part so a
    /// spreadsheet `1102.0` reads back as `1102`.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned(format!("{}", *n as i64))
            }
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Empty => Cow::Borrowed(""),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
            Self::Empty => true,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// A raw row: original column label → cell.
pub type RawRow = HashMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Movement,
    Snapshot { period: String },
}

/// Which field identifies a product in a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    #[default]
    Identifier,
    Name,
}

/// Table-level parameters supplied by whoever located the source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableSpec {
    pub source_tag: String,
    pub kind: TableKind,
    #[serde(default)]
    pub key: KeySource,
}

impl TableSpec {
    pub fn movement(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            kind: TableKind::Movement,
            key: KeySource::Identifier,
        }
    }

    pub fn snapshot(source_tag: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            kind: TableKind::Snapshot {
                period: period.into(),
            },
            key: KeySource::Identifier,
        }
    }

    pub fn keyed_by_name(mut self) -> Self {
        self.key = KeySource::Name;
        self
    }
}

/// One input table: labels in table order plus its rows.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceTable {
    pub spec: TableSpec,
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Identifier,
    Name,
    Quantity,
    OperationCode,
    Direction,
    PeriodMarker,
    InboundQuantity,
    OutboundQuantity,
    Value,
}

impl Role {
    /// Resolution order used by the schema detector. Specific roles come
    /// first so generic fragments of later roles cannot claim their columns.
    pub const PRECEDENCE: [Role; 9] = [
        Role::OperationCode,
        Role::InboundQuantity,
        Role::OutboundQuantity,
        Role::Quantity,
        Role::Value,
        Role::Identifier,
        Role::Direction,
        Role::PeriodMarker,
        Role::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Name => "name",
            Self::Quantity => "quantity",
            Self::OperationCode => "operation_code",
            Self::Direction => "direction",
            Self::PeriodMarker => "period_marker",
            Self::InboundQuantity => "inbound_quantity",
            Self::OutboundQuantity => "outbound_quantity",
            Self::Value => "value",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role → original column label for one table. No two roles share a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    columns: BTreeMap<Role, String>,
    fallback: BTreeSet<Role>,
}

impl ColumnMapping {
    pub(crate) fn bind(&mut self, role: Role, column: &str, by_fallback: bool) {
        self.columns.insert(role, column.to_string());
        if by_fallback {
            self.fallback.insert(role);
        }
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.columns.get(&role).map(|s| s.as_str())
    }

    pub fn has(&self, role: Role) -> bool {
        self.columns.contains_key(&role)
    }

    pub fn is_bound(&self, column: &str) -> bool {
        self.columns.values().any(|c| c == column)
    }

    /// True when the role was assigned positionally rather than by a fragment.
    pub fn is_fallback(&self, role: Role) -> bool {
        self.fallback.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.columns.iter().map(|(r, c)| (*r, c.as_str()))
    }

    /// Split inbound/outbound quantity columns present.
    pub fn has_split_quantities(&self) -> bool {
        self.has(Role::InboundQuantity) || self.has(Role::OutboundQuantity)
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "INBOUND"),
            Self::Outbound => write!(f, "OUTBOUND"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementRecord {
    pub product_key: String,
    pub product_name: Option<String>,
    pub quantity: f64,
    pub direction: Direction,
    pub source_tag: String,
    pub operation_code: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub product_key: String,
    pub product_name: Option<String>,
    pub quantity: f64,
    pub period: String,
    pub source_tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Movement(MovementRecord),
    Snapshot(SnapshotRecord),
}

impl Record {
    pub fn product_key(&self) -> &str {
        match self {
            Self::Movement(m) => &m.product_key,
            Self::Snapshot(s) => &s.product_key,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Per-product accumulator built by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductLedger {
    pub product_key: String,
    pub display_name: Option<String>,
    pub total_inbound: f64,
    pub total_outbound: f64,
    pub inbound_value: Option<f64>,
    pub outbound_value: Option<f64>,
    pub movement_count: usize,
    pub unknown_movements: usize,
    pub snapshots: BTreeMap<String, f64>,
    /// Table that supplied each kept snapshot, by period.
    pub snapshot_sources: BTreeMap<String, String>,
    pub operation_codes: BTreeSet<String>,
    pub sources: BTreeSet<String>,
}

impl ProductLedger {
    pub fn new(product_key: impl Into<String>) -> Self {
        Self {
            product_key: product_key.into(),
            display_name: None,
            total_inbound: 0.0,
            total_outbound: 0.0,
            inbound_value: None,
            outbound_value: None,
            movement_count: 0,
            unknown_movements: 0,
            snapshots: BTreeMap::new(),
            snapshot_sources: BTreeMap::new(),
            operation_codes: BTreeSet::new(),
            sources: BTreeSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Excess,
    Shortage,
    MissingBaseline,
    Critical,
    Alert,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Excess => write!(f, "EXCESS"),
            Self::Shortage => write!(f, "SHORTAGE"),
            Self::MissingBaseline => write!(f, "MISSING_BASELINE"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Alert => write!(f, "ALERT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub product_key: String,
    pub display_name: Option<String>,
    pub initial_stock: f64,
    pub final_stock: f64,
    pub total_inbound: f64,
    pub total_outbound: f64,
    pub expected_stock: f64,
    pub delta: f64,
    pub severity: Severity,
    /// Either snapshot absent; the corresponding stock above is a default 0.
    pub snapshot_missing: bool,
    pub initial_missing: bool,
    pub final_missing: bool,
    pub unknown_movements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_value: Option<f64>,
    pub operation_codes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeverityTotals {
    pub count: usize,
    pub ok: usize,
    pub excess: usize,
    pub shortage: usize,
    pub missing_baseline: usize,
    pub critical: usize,
    pub alert: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeverityPercentages {
    pub ok: f64,
    pub excess: f64,
    pub shortage: f64,
    pub missing_baseline: f64,
    pub critical: f64,
    pub alert: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutboundSummary {
    pub total_quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value: Option<f64>,
}

/// A table skipped because its schema could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableFailure {
    pub source_tag: String,
    pub message: String,
}

/// Row/table-level problems absorbed during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQuality {
    pub rejected_rows: usize,
    pub warnings: usize,
    pub unknown_movements: usize,
    pub skipped_tables: usize,
    pub rejections: Vec<RowRejection>,
    pub warning_details: Vec<DataQualityWarning>,
    pub table_failures: Vec<TableFailure>,
}

impl DataQuality {
    pub fn reject(&mut self, rejection: RowRejection) {
        self.rejected_rows += 1;
        self.rejections.push(rejection);
    }

    pub fn warn(&mut self, warning: DataQualityWarning) {
        self.warnings += 1;
        self.warning_details.push(warning);
    }

    pub fn skip_table(&mut self, failure: TableFailure) {
        self.skipped_tables += 1;
        self.table_failures.push(failure);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportMeta {
    pub config_name: String,
    pub engine_version: String,
    pub mode: String,
    pub tolerance: f64,
    pub relative_tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub meta: ReportMeta,
    pub totals: SeverityTotals,
    pub percentages: SeverityPercentages,
    pub outbound: OutboundSummary,
    pub data_quality: DataQuality,
    pub results: Vec<ReconciliationResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_number_renders_without_fraction() {
        assert_eq!(CellValue::Number(1102.0).as_text(), "1102");
        assert_eq!(CellValue::Number(2.5).as_text(), "2.5");
        assert_eq!(CellValue::Empty.as_text(), "");
    }

    #[test]
    fn cells_deserialize_untagged() {
        let row: RawRow =
            serde_json::from_str(r#"{"Codigo": "A1", "Qtd": 12, "Obs": null}"#).unwrap();
        assert_eq!(row["Codigo"], CellValue::Text("A1".into()));
        assert_eq!(row["Qtd"], CellValue::Number(12.0));
        assert_eq!(row["Obs"], CellValue::Empty);
    }

    #[test]
    fn severity_serializes_screaming() {
        let json = serde_json::to_string(&Severity::MissingBaseline).unwrap();
        assert_eq!(json, "\"MISSING_BASELINE\"");
    }
}
