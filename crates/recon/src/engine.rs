use crate::aggregate::Ledgers;
use crate::classify::MovementClassifier;
use crate::config::{ReconConfig, SeverityMode, ToleranceConfig};
use crate::error::ReconError;
use crate::model::{
    DataQuality, ProductLedger, ReconciliationResult, Report, ReportMeta, Severity, SourceTable,
    TableFailure,
};
use crate::normalize::RecordNormalizer;
use crate::report;
use crate::schema::SchemaDetector;

/// Run the full pipeline over pre-loaded tables.
///
/// Only configuration errors are returned. A table whose schema cannot be
/// resolved is skipped and recorded; rejected rows are tallied.
pub fn run(config: &ReconConfig, tables: &[SourceTable]) -> Result<Report, ReconError> {
    config.validate()?;
    let classifier = MovementClassifier::new(&config.directions)?;
    let detector = SchemaDetector::new(&config.schema);
    let normalizer = RecordNormalizer::new(&classifier);

    let mut quality = DataQuality::default();
    let mut records = Vec::new();

    for table in tables {
        let spec = &table.spec;
        let mapping = match detector.detect(&spec.source_tag, &table.columns) {
            Ok(mapping) => mapping,
            Err(err) => {
                log::warn!("skipping table: {err}");
                quality.skip_table(TableFailure {
                    source_tag: spec.source_tag.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };

        for (idx, row) in table.rows.iter().enumerate() {
            match normalizer.normalize(row, idx, &mapping, spec) {
                Ok(normalized) => records.extend(normalized),
                Err(rejection) => {
                    log::debug!("rejected {rejection}");
                    quality.reject(rejection);
                }
            }
        }
    }

    let mut ledgers = records.into_iter().fold(Ledgers::default(), Ledgers::fold);
    quality.unknown_movements = ledgers.unknown_movements();
    for warning in std::mem::take(&mut ledgers.warnings) {
        quality.warn(warning);
    }

    let selected: Vec<&ProductLedger> = match config.top_n {
        Some(n) => top_by_outbound(&ledgers, n),
        None => ledgers.ledgers.values().collect(),
    };
    let results: Vec<ReconciliationResult> =
        selected.into_iter().map(|l| reconcile(l, config)).collect();

    let report = report::build(results, quality, meta(config));
    log::info!(
        "{}: {} products, {} ok, {} rejected rows, {} warnings, {} skipped tables",
        report.meta.config_name,
        report.totals.count,
        report.totals.ok,
        report.data_quality.rejected_rows,
        report.data_quality.warnings,
        report.data_quality.skipped_tables,
    );
    Ok(report)
}

fn meta(config: &ReconConfig) -> ReportMeta {
    ReportMeta {
        config_name: config.name.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        mode: config.mode.to_string(),
        tolerance: config.tolerance.absolute,
        relative_tolerance: config.tolerance.relative,
        top_n: config.top_n,
    }
}

// ---------------------------------------------------------------------------
// Per-product reconciliation
// ---------------------------------------------------------------------------

/// Compare one ledger's snapshots against its movements.
pub fn reconcile(ledger: &ProductLedger, config: &ReconConfig) -> ReconciliationResult {
    let initial = ledger.snapshots.get(&config.periods.initial).copied();
    let final_ = ledger.snapshots.get(&config.periods.final_).copied();

    let initial_stock = initial.unwrap_or(0.0);
    let final_stock = final_.unwrap_or(0.0);
    let expected_stock = initial_stock + ledger.total_inbound - ledger.total_outbound;

    ReconciliationResult {
        product_key: ledger.product_key.clone(),
        display_name: ledger.display_name.clone(),
        initial_stock,
        final_stock,
        total_inbound: ledger.total_inbound,
        total_outbound: ledger.total_outbound,
        expected_stock,
        delta: final_stock - expected_stock,
        severity: classify_severity(
            initial,
            final_,
            ledger.total_inbound,
            ledger.total_outbound,
            &config.tolerance,
            config.mode,
        ),
        snapshot_missing: initial.is_none() || final_.is_none(),
        initial_missing: initial.is_none(),
        final_missing: final_.is_none(),
        unknown_movements: ledger.unknown_movements,
        outbound_value: ledger.outbound_value,
        operation_codes: ledger.operation_codes.iter().cloned().collect(),
    }
}

/// Severity for one product. A missing snapshot counts as 0 unless both are
/// missing, which is `MissingBaseline`. Thresholds are inclusive.
pub fn classify_severity(
    initial: Option<f64>,
    final_: Option<f64>,
    inbound: f64,
    outbound: f64,
    tolerance: &ToleranceConfig,
    mode: SeverityMode,
) -> Severity {
    if initial.is_none() && final_.is_none() {
        return Severity::MissingBaseline;
    }
    let expected = initial.unwrap_or(0.0) + inbound - outbound;
    let delta = final_.unwrap_or(0.0) - expected;

    match mode {
        SeverityMode::Absolute => {
            if delta.abs() <= tolerance.absolute {
                Severity::Ok
            } else if delta > 0.0 {
                Severity::Excess
            } else {
                Severity::Shortage
            }
        }
        SeverityMode::Relative => {
            let threshold = tolerance.relative * outbound;
            if delta.abs() <= threshold {
                Severity::Ok
            } else if delta < 0.0 {
                Severity::Critical
            } else {
                Severity::Alert
            }
        }
    }
}

/// The `n` ledgers with the highest outbound volume, ties by key ascending.
pub fn top_by_outbound(ledgers: &Ledgers, n: usize) -> Vec<&ProductLedger> {
    let mut ranked: Vec<&ProductLedger> = ledgers.ledgers.values().collect();
    ranked.sort_by(|a, b| {
        b.total_outbound
            .total_cmp(&a.total_outbound)
            .then_with(|| a.product_key.cmp(&b.product_key))
    });
    ranked.truncate(n);
    ranked
}
