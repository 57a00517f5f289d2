use crate::model::{
    DataQuality, OutboundSummary, ReconciliationResult, Report, ReportMeta, Severity,
    SeverityPercentages, SeverityTotals,
};

/// Assemble the report: per-severity counts and shares, outbound totals, and
/// results ordered by `|delta|` descending then `product_key` ascending.
pub fn build(
    mut results: Vec<ReconciliationResult>,
    data_quality: DataQuality,
    meta: ReportMeta,
) -> Report {
    let totals = compute_totals(&results);
    let percentages = compute_percentages(&totals);
    let outbound = compute_outbound(&results);

    results.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.product_key.cmp(&b.product_key))
    });

    Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        meta,
        totals,
        percentages,
        outbound,
        data_quality,
        results,
    }
}

pub fn compute_totals(results: &[ReconciliationResult]) -> SeverityTotals {
    let mut totals = SeverityTotals {
        count: results.len(),
        ..SeverityTotals::default()
    };
    for r in results {
        match r.severity {
            Severity::Ok => totals.ok += 1,
            Severity::Excess => totals.excess += 1,
            Severity::Shortage => totals.shortage += 1,
            Severity::MissingBaseline => totals.missing_baseline += 1,
            Severity::Critical => totals.critical += 1,
            Severity::Alert => totals.alert += 1,
        }
    }
    totals
}

fn compute_percentages(totals: &SeverityTotals) -> SeverityPercentages {
    let pct = |n: usize| {
        if totals.count == 0 {
            0.0
        } else {
            (n as f64 * 100.0 / totals.count as f64 * 100.0).round() / 100.0
        }
    };
    SeverityPercentages {
        ok: pct(totals.ok),
        excess: pct(totals.excess),
        shortage: pct(totals.shortage),
        missing_baseline: pct(totals.missing_baseline),
        critical: pct(totals.critical),
        alert: pct(totals.alert),
    }
}

/// Outbound value is only reported when some product carried values.
fn compute_outbound(results: &[ReconciliationResult]) -> OutboundSummary {
    OutboundSummary {
        total_quantity: results.iter().map(|r| r.total_outbound).sum(),
        total_value: results
            .iter()
            .filter_map(|r| r.outbound_value)
            .reduce(|a, b| a + b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, delta: f64, severity: Severity) -> ReconciliationResult {
        ReconciliationResult {
            product_key: key.into(),
            display_name: None,
            initial_stock: 0.0,
            final_stock: delta,
            total_inbound: 0.0,
            total_outbound: 2.0,
            expected_stock: 0.0,
            delta,
            severity,
            snapshot_missing: false,
            initial_missing: false,
            final_missing: false,
            unknown_movements: 0,
            outbound_value: None,
            operation_codes: vec![],
        }
    }

    fn build_default(results: Vec<ReconciliationResult>) -> Report {
        build(results, DataQuality::default(), ReportMeta::default())
    }

    #[test]
    fn counts_and_percentages() {
        let report = build_default(vec![
            result("A", 0.0, Severity::Ok),
            result("B", 0.5, Severity::Ok),
            result("C", -3.0, Severity::Shortage),
        ]);
        assert_eq!(report.totals.count, 3);
        assert_eq!(report.totals.ok, 2);
        assert_eq!(report.totals.shortage, 1);
        assert_eq!(report.percentages.ok, 66.67);
        assert_eq!(report.percentages.shortage, 33.33);
        assert_eq!(report.percentages.excess, 0.0);
    }

    #[test]
    fn empty_report_has_zero_percentages() {
        let report = build_default(vec![]);
        assert_eq!(report.totals, SeverityTotals::default());
        assert_eq!(report.percentages, SeverityPercentages::default());
        assert_eq!(report.outbound.total_quantity, 0.0);
        assert_eq!(report.outbound.total_value, None);
    }

    #[test]
    fn ordered_by_abs_delta_then_key() {
        let report = build_default(vec![
            result("B", 1.0, Severity::Ok),
            result("C", -5.0, Severity::Shortage),
            result("A", -1.0, Severity::Ok),
            result("D", 5.0, Severity::Excess),
        ]);
        let keys: Vec<&str> = report.results.iter().map(|r| r.product_key.as_str()).collect();
        assert_eq!(keys, vec!["C", "D", "A", "B"]);
    }

    #[test]
    fn outbound_value_only_when_present() {
        let mut with_value = result("A", 0.0, Severity::Ok);
        with_value.outbound_value = Some(150.0);
        let report = build_default(vec![with_value, result("B", 0.0, Severity::Ok)]);
        assert_eq!(report.outbound.total_quantity, 4.0);
        assert_eq!(report.outbound.total_value, Some(150.0));
    }

    #[test]
    fn serializes_stable_field_names() {
        let report = build_default(vec![result("A", 2.0, Severity::Excess)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totals"]["excess"], 1);
        assert_eq!(json["results"][0]["severity"], "EXCESS");
        assert!(json["outbound"].get("total_value").is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(json["generated_at"].as_str().unwrap()).is_ok());
    }
}
