// Property-based tests for aggregation and severity classification.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use stockrecon::aggregate::Ledgers;
use stockrecon::config::{ReconConfig, SeverityMode, ToleranceConfig};
use stockrecon::engine::{classify_severity, reconcile};
use stockrecon::model::{Direction, MovementRecord, Record, Severity, SnapshotRecord};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        4 => Just(Direction::Inbound),
        4 => Just(Direction::Outbound),
        1 => Just(Direction::Unknown),
    ]
}

/// Integral quantities keep float sums exact in any order.
fn arb_movement() -> impl Strategy<Value = Record> {
    ("[A-E]", 0u32..10_000, arb_direction(), "[a-c]").prop_map(|(key, qty, direction, source)| {
        Record::Movement(MovementRecord {
            product_key: key,
            product_name: None,
            quantity: f64::from(qty),
            direction,
            source_tag: source,
            operation_code: None,
            value: None,
        })
    })
}

/// One snapshot per (key, period) so no overwrite order matters.
fn arb_snapshots() -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::btree_map(
        ("[A-E]", prop_oneof![Just("initial"), Just("final")]),
        0u32..10_000,
        0..10,
    )
    .prop_map(|m| {
        m.into_iter()
            .map(|((key, period), qty)| {
                Record::Snapshot(SnapshotRecord {
                    product_key: key,
                    product_name: None,
                    quantity: f64::from(qty),
                    period: period.to_string(),
                    source_tag: "inv".into(),
                })
            })
            .collect()
    })
}

fn arb_records() -> impl Strategy<Value = Vec<Record>> {
    (proptest::collection::vec(arb_movement(), 0..60), arb_snapshots()).prop_map(
        |(mut movements, snapshots)| {
            movements.extend(snapshots);
            movements
        },
    )
}

fn arb_stock() -> impl Strategy<Value = Option<f64>> {
    proptest::option::of((0u32..100_000).prop_map(f64::from))
}

fn arb_mode() -> impl Strategy<Value = SeverityMode> {
    prop_oneof![Just(SeverityMode::Absolute), Just(SeverityMode::Relative)]
}

fn fold(records: Vec<Record>) -> Ledgers {
    records.into_iter().fold(Ledgers::default(), Ledgers::fold)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn totals_independent_of_order(
        (records, shuffled) in arb_records().prop_flat_map(|r| {
            let original = r.clone();
            (Just(original), Just(r).prop_shuffle())
        })
    ) {
        let a = fold(records);
        let b = fold(shuffled);

        prop_assert_eq!(a.len(), b.len());
        prop_assert_eq!(a.unknown_movements(), b.unknown_movements());
        for (key, la) in &a.ledgers {
            let lb = b.get(key).unwrap();
            prop_assert_eq!(la.total_inbound, lb.total_inbound);
            prop_assert_eq!(la.total_outbound, lb.total_outbound);
            prop_assert_eq!(la.movement_count, lb.movement_count);
            prop_assert_eq!(&la.snapshots, &lb.snapshots);
        }
    }

    #[test]
    fn split_fold_then_merge_matches_single_fold(
        records in arb_records(),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(records.len() + 1);
        let (left, right) = records.split_at(at);
        let merged = fold(left.to_vec()).merge(fold(right.to_vec()));
        let single = fold(records.clone());

        prop_assert_eq!(merged.len(), single.len());
        for (key, ls) in &single.ledgers {
            let lm = merged.get(key).unwrap();
            prop_assert_eq!(lm.total_inbound, ls.total_inbound);
            prop_assert_eq!(lm.total_outbound, ls.total_outbound);
            prop_assert_eq!(&lm.snapshots, &ls.snapshots);
        }
    }

    #[test]
    fn expected_stock_identity(records in arb_records()) {
        let config = ReconConfig::default();
        for ledger in fold(records).ledgers.values() {
            let r = reconcile(ledger, &config);
            prop_assert_eq!(r.expected_stock, r.initial_stock + r.total_inbound - r.total_outbound);
            prop_assert_eq!(r.delta, r.final_stock - r.expected_stock);
            prop_assert_eq!(r.snapshot_missing, r.initial_missing || r.final_missing);
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn severity_deterministic(
        initial in arb_stock(),
        final_ in arb_stock(),
        inbound in (0u32..50_000).prop_map(f64::from),
        outbound in (0u32..50_000).prop_map(f64::from),
        mode in arb_mode(),
    ) {
        let tol = ToleranceConfig::default();
        let first = classify_severity(initial, final_, inbound, outbound, &tol, mode);
        let second = classify_severity(initial, final_, inbound, outbound, &tol, mode);
        prop_assert_eq!(first, second);

        if initial.is_none() && final_.is_none() {
            prop_assert_eq!(first, Severity::MissingBaseline);
        }
        let allowed: &[Severity] = match mode {
            SeverityMode::Absolute => &[Severity::Ok, Severity::Excess, Severity::Shortage, Severity::MissingBaseline],
            SeverityMode::Relative => &[Severity::Ok, Severity::Critical, Severity::Alert, Severity::MissingBaseline],
        };
        prop_assert!(allowed.contains(&first));
    }

    #[test]
    fn delta_at_tolerance_is_ok(
        initial in (0u32..10_000).prop_map(f64::from),
        inbound in (0u32..10_000).prop_map(f64::from),
        outbound in (0u32..10_000).prop_map(f64::from),
        tolerance in 0u32..50,
        sign in prop_oneof![Just(1.0), Just(-1.0)],
    ) {
        let tol = ToleranceConfig { absolute: f64::from(tolerance), ..ToleranceConfig::default() };
        let expected = initial + inbound - outbound;
        let at_boundary = expected + sign * tol.absolute;
        let past_boundary = at_boundary + sign;

        prop_assert_eq!(
            classify_severity(Some(initial), Some(at_boundary), inbound, outbound, &tol, SeverityMode::Absolute),
            Severity::Ok
        );
        let past = classify_severity(Some(initial), Some(past_boundary), inbound, outbound, &tol, SeverityMode::Absolute);
        prop_assert_eq!(past, if sign > 0.0 { Severity::Excess } else { Severity::Shortage });
    }
}
