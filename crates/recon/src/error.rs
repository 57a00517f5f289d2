use std::fmt;

use serde::Serialize;

use crate::model::Role;

/// Hard failures. Only `ConfigParse` and `Configuration` ever reach the caller
/// of `run`; schema failures are absorbed per table.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Invalid tolerance, direction codes, period labels, etc.
    Configuration(String),
    /// A mandatory role could not be resolved on a source table.
    Schema { source_tag: String, role: Role },
    /// Delimited-text read error.
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Schema { source_tag, role } => {
                write!(f, "table '{source_tag}': no column for mandatory role '{role}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

// ---------------------------------------------------------------------------
// Row rejections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RejectReason {
    /// Key field blank or a null marker (`nan`, `null`, `none`).
    BlankKey,
    /// No quantity cell at all (split columns both blank included).
    MissingQuantity,
    /// Quantity present but not a non-negative number.
    UnparseableQuantity(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankKey => write!(f, "blank product key"),
            Self::MissingQuantity => write!(f, "missing quantity"),
            Self::UnparseableQuantity(raw) => write!(f, "cannot parse quantity '{raw}'"),
        }
    }
}

/// A row that failed normalization. Excluded from aggregation, counted in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    pub source_tag: String,
    /// Zero-based data row index within the table (header excluded).
    pub row: usize,
    pub reason: RejectReason,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table '{}', row {}: {}", self.source_tag, self.row, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Data-quality warnings
// ---------------------------------------------------------------------------

/// Non-fatal anomaly recorded during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// A second snapshot for the same (product, period) with a different value.
    /// `current` is the value that was kept.
    SnapshotConflict {
        product_key: String,
        period: String,
        previous: f64,
        current: f64,
        source_tag: String,
    },
    /// Movement whose direction could not be determined.
    UnknownDirection {
        product_key: String,
        source_tag: String,
        operation_code: Option<String>,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotConflict {
                product_key,
                period,
                previous,
                current,
                source_tag,
            } => write!(
                f,
                "product '{product_key}', period '{period}': snapshot {previous} overwritten by {current} from '{source_tag}'"
            ),
            Self::UnknownDirection {
                product_key,
                source_tag,
                operation_code,
            } => match operation_code {
                Some(code) => write!(
                    f,
                    "product '{product_key}' in '{source_tag}': unknown direction for operation code '{code}'"
                ),
                None => write!(
                    f,
                    "product '{product_key}' in '{source_tag}': movement without direction"
                ),
            },
        }
    }
}
