use std::collections::BTreeMap;

use crate::error::DataQualityWarning;
use crate::model::{Direction, MovementRecord, ProductLedger, Record, SnapshotRecord};

/// Snapshot values closer than this are the same observation.
const SNAPSHOT_EPSILON: f64 = 1e-9;

/// Per-product ledgers plus the warnings raised while building them.
///
/// Movement totals are plain sums, so any fold order gives the same totals.
/// Only a second snapshot for the same (product, period) and `display_name`
/// depend on order; the former always raises a warning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledgers {
    pub ledgers: BTreeMap<String, ProductLedger>,
    pub warnings: Vec<DataQualityWarning>,
}

impl Ledgers {
    /// Fold one record in.
    pub fn fold(mut self, record: Record) -> Self {
        match record {
            Record::Movement(m) => self.apply_movement(m),
            Record::Snapshot(s) => self.apply_snapshot(s),
        }
        self
    }

    /// Combine ledgers folded independently, `other` applied last.
    pub fn merge(mut self, other: Ledgers) -> Self {
        self.warnings.extend(other.warnings);
        for (key, theirs) in other.ledgers {
            let ours = self
                .ledgers
                .entry(key.clone())
                .or_insert_with(|| ProductLedger::new(key.clone()));
            ours.total_inbound += theirs.total_inbound;
            ours.total_outbound += theirs.total_outbound;
            ours.inbound_value = add_opt(ours.inbound_value, theirs.inbound_value);
            ours.outbound_value = add_opt(ours.outbound_value, theirs.outbound_value);
            ours.movement_count += theirs.movement_count;
            ours.unknown_movements += theirs.unknown_movements;
            ours.operation_codes.extend(theirs.operation_codes);
            ours.sources.extend(theirs.sources);
            if theirs.display_name.is_some() {
                ours.display_name = theirs.display_name;
            }
            for (period, quantity) in theirs.snapshots {
                let source = theirs.snapshot_sources.get(&period).map_or("", String::as_str);
                if let Some(w) = put_snapshot(ours, &period, quantity, source) {
                    self.warnings.push(w);
                }
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn get(&self, product_key: &str) -> Option<&ProductLedger> {
        self.ledgers.get(product_key)
    }

    pub fn unknown_movements(&self) -> usize {
        self.ledgers.values().map(|l| l.unknown_movements).sum()
    }

    fn entry(&mut self, key: &str) -> &mut ProductLedger {
        self.ledgers
            .entry(key.to_string())
            .or_insert_with(|| ProductLedger::new(key))
    }

    fn apply_movement(&mut self, m: MovementRecord) {
        let ledger = self.entry(&m.product_key);
        ledger.movement_count += 1;
        ledger.sources.insert(m.source_tag.clone());
        if let Some(code) = &m.operation_code {
            ledger.operation_codes.insert(code.clone());
        }
        if let Some(name) = m.product_name.filter(|n| !n.is_empty()) {
            ledger.display_name = Some(name);
        }

        match m.direction {
            Direction::Inbound => {
                ledger.total_inbound += m.quantity;
                ledger.inbound_value = add_opt(ledger.inbound_value, m.value);
            }
            Direction::Outbound => {
                ledger.total_outbound += m.quantity;
                ledger.outbound_value = add_opt(ledger.outbound_value, m.value);
            }
            Direction::Unknown => {
                ledger.unknown_movements += 1;
                self.warnings.push(DataQualityWarning::UnknownDirection {
                    product_key: m.product_key,
                    source_tag: m.source_tag,
                    operation_code: m.operation_code,
                });
            }
        }
    }

    fn apply_snapshot(&mut self, s: SnapshotRecord) {
        let ledger = self.entry(&s.product_key);
        ledger.sources.insert(s.source_tag.clone());
        if let Some(name) = s.product_name.filter(|n| !n.is_empty()) {
            ledger.display_name = Some(name);
        }
        if let Some(w) = put_snapshot(ledger, &s.period, s.quantity, &s.source_tag) {
            self.warnings.push(w);
        }
    }
}

/// Last write wins; a differing prior value is reported.
fn put_snapshot(
    ledger: &mut ProductLedger,
    period: &str,
    quantity: f64,
    source_tag: &str,
) -> Option<DataQualityWarning> {
    ledger
        .snapshot_sources
        .insert(period.to_string(), source_tag.to_string());
    let previous = ledger.snapshots.insert(period.to_string(), quantity)?;
    if (previous - quantity).abs() <= SNAPSHOT_EPSILON {
        return None;
    }
    log::warn!(
        "product '{}', period '{period}': snapshot {previous} replaced by {quantity} from '{source_tag}'",
        ledger.product_key
    );
    Some(DataQualityWarning::SnapshotConflict {
        product_key: ledger.product_key.clone(),
        period: period.to_string(),
        previous,
        current: quantity,
        source_tag: source_tag.to_string(),
    })
}

fn add_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (x, None) => x,
        (None, y) => y,
    }
}
