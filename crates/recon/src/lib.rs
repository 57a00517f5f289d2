//! `stockrecon`: stock reconciliation engine.
//!
//! Pure engine crate: receives tables already extracted from spreadsheets or
//! documents, infers which column carries what, folds rows into per-product
//! ledgers and checks `initial + inbound - outbound` against the counted
//! final stock. No CLI or file IO; `source` only parses in-memory CSV text.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod source;

pub use aggregate::Ledgers;
pub use classify::MovementClassifier;
pub use config::ReconConfig;
pub use engine::{classify_severity, reconcile, run};
pub use error::ReconError;
pub use model::{Record, ReconciliationResult, Report, Severity, SourceTable, TableSpec};
pub use normalize::RecordNormalizer;
pub use schema::SchemaDetector;
pub use source::table_from_csv;
