use std::collections::BTreeSet;

use crate::config::DirectionCodes;
use crate::error::ReconError;
use crate::model::Direction;

/// Maps operation codes to a movement direction by their leading character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementClassifier {
    inbound: BTreeSet<char>,
    outbound: BTreeSet<char>,
}

impl MovementClassifier {
    pub fn new(codes: &DirectionCodes) -> Result<Self, ReconError> {
        let (inbound, outbound) = codes.to_sets()?;
        Ok(Self { inbound, outbound })
    }

    /// Classify an operation code. Whitespace and punctuation are ignored,
    /// so "5.101", " 5101 " and "5-101" read the same. Never fails.
    pub fn classify(&self, code: &str) -> Direction {
        let Some(lead) = code.chars().find(|c| c.is_alphanumeric()) else {
            return Direction::Unknown;
        };
        if self.inbound.contains(&lead) {
            Direction::Inbound
        } else if self.outbound.contains(&lead) {
            Direction::Outbound
        } else {
            Direction::Unknown
        }
    }
}

impl Default for MovementClassifier {
    fn default() -> Self {
        Self {
            inbound: BTreeSet::from(['1', '2', '3']),
            outbound: BTreeSet::from(['5', '6', '7']),
        }
    }
}

/// Classify a free-text direction cell ("Entrada", "S", "out", ...).
pub fn classify_label(label: &str) -> Direction {
    match label.trim().to_lowercase().as_str() {
        "entrada" | "entradas" | "e" | "in" | "inbound" | "compra" | "compras" => {
            Direction::Inbound
        }
        "saida" | "saída" | "saidas" | "saídas" | "s" | "out" | "outbound" | "venda"
        | "vendas" => Direction::Outbound,
        _ => Direction::Unknown,
    }
}
