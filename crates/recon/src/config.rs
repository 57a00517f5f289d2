use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::Role;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub mode: SeverityMode,
    /// Reconcile only the `top_n` products by outbound volume.
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub directions: DirectionCodes,
    #[serde(default)]
    pub periods: PeriodLabels,
    #[serde(default)]
    pub schema: SchemaConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            mode: SeverityMode::default(),
            top_n: None,
            tolerance: ToleranceConfig::default(),
            directions: DirectionCodes::default(),
            periods: PeriodLabels::default(),
            schema: SchemaConfig::default(),
        }
    }
}

fn default_name() -> String {
    "stock reconciliation".into()
}

// ---------------------------------------------------------------------------
// Severity mode + tolerance
// ---------------------------------------------------------------------------

/// Absolute: full catalog against a unit tolerance.
/// Relative: sales-ranked subset against a share of outbound volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityMode {
    #[default]
    Absolute,
    Relative,
}

impl std::fmt::Display for SeverityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "absolute"),
            Self::Relative => write!(f, "relative"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ToleranceConfig {
    /// Units of stock. Inclusive.
    #[serde(default = "default_absolute")]
    pub absolute: f64,
    /// Fraction of total outbound. Inclusive.
    #[serde(default = "default_relative")]
    pub relative: f64,
}

fn default_absolute() -> f64 {
    1.0
}

fn default_relative() -> f64 {
    0.10
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            absolute: default_absolute(),
            relative: default_relative(),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction codes
// ---------------------------------------------------------------------------

/// Leading characters of an operation code per direction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectionCodes {
    pub inbound: Vec<String>,
    pub outbound: Vec<String>,
}

impl Default for DirectionCodes {
    fn default() -> Self {
        Self {
            inbound: vec!["1".into(), "2".into(), "3".into()],
            outbound: vec!["5".into(), "6".into(), "7".into()],
        }
    }
}

impl DirectionCodes {
    /// Parse into character sets, rejecting empty, multi-character and
    /// overlapping entries.
    pub fn to_sets(&self) -> Result<(BTreeSet<char>, BTreeSet<char>), ReconError> {
        let inbound = code_set("inbound", &self.inbound)?;
        let outbound = code_set("outbound", &self.outbound)?;
        if let Some(c) = inbound.intersection(&outbound).next() {
            return Err(ReconError::Configuration(format!(
                "direction code '{c}' is both inbound and outbound"
            )));
        }
        Ok((inbound, outbound))
    }
}

fn code_set(label: &str, codes: &[String]) -> Result<BTreeSet<char>, ReconError> {
    if codes.is_empty() {
        return Err(ReconError::Configuration(format!(
            "{label} direction codes must not be empty"
        )));
    }
    let mut set = BTreeSet::new();
    for code in codes {
        let mut chars = code.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphanumeric() => {
                set.insert(c);
            }
            _ => {
                return Err(ReconError::Configuration(format!(
                    "{label} direction code '{code}' must be a single character"
                )))
            }
        }
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// Period labels
// ---------------------------------------------------------------------------

/// Snapshot period labels read by the reconciliation step, e.g. "2023"/"2024".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeriodLabels {
    #[serde(default = "default_initial")]
    pub initial: String,
    #[serde(default = "default_final", rename = "final")]
    pub final_: String,
}

fn default_initial() -> String {
    "initial".into()
}

fn default_final() -> String {
    "final".into()
}

impl Default for PeriodLabels {
    fn default() -> Self {
        Self {
            initial: default_initial(),
            final_: default_final(),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema fragments
// ---------------------------------------------------------------------------

/// One matching rule: a column whose normalized label contains `fragment`
/// is a candidate for `role`. Lower `priority` is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FragmentRule {
    pub role: Role,
    pub fragment: String,
    #[serde(default)]
    pub priority: u32,
}

impl FragmentRule {
    pub fn new(role: Role, fragment: &str, priority: u32) -> Self {
        Self {
            role,
            fragment: fragment.to_string(),
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_fragments")]
    pub fragments: Vec<FragmentRule>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            fragments: default_fragments(),
        }
    }
}

/// Built-in rules covering Portuguese fiscal spreadsheets and English exports.
const DEFAULT_FRAGMENTS: &[(Role, &[&str])] = &[
    (Role::OperationCode, &["cfop", "operation code", "op code", "cod operacao"]),
    (Role::InboundQuantity, &["qtd entrada", "entradas", "entrada", "inbound", "compras", "incoming"]),
    (Role::OutboundQuantity, &["qtd saida", "saídas", "saidas", "saída", "saida", "outbound", "vendas", "outgoing"]),
    (Role::Quantity, &["quantidade", "quantity", "qtde", "qtd", "qty", "quant", "estoque", "stock", "saldo"]),
    (Role::Value, &["valor total", "vl total", "valor", "value", "amount", "preco total", "total"]),
    (Role::Identifier, &["sku", "código", "codigo", "code", "cod", "ean", "gtin", "referencia", "ref", "id"]),
    (Role::Direction, &["direction", "direção", "direcao", "sentido", "movimento", "e/s", "tipo"]),
    (Role::PeriodMarker, &["período", "periodo", "period", "exercicio", "year", "ano"]),
    (Role::Name, &["descrição", "descricao", "description", "produto", "product", "mercadoria", "nome", "name", "desc", "item"]),
];

fn default_fragments() -> Vec<FragmentRule> {
    DEFAULT_FRAGMENTS
        .iter()
        .flat_map(|(role, fragments)| {
            fragments
                .iter()
                .enumerate()
                .map(move |(i, f)| FragmentRule::new(*role, f, i as u32))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let t = &self.tolerance;
        if !t.absolute.is_finite() || t.absolute < 0.0 {
            return Err(ReconError::Configuration(format!(
                "absolute tolerance must be a non-negative number, got {}",
                t.absolute
            )));
        }
        if !t.relative.is_finite() || t.relative < 0.0 {
            return Err(ReconError::Configuration(format!(
                "relative tolerance must be a non-negative number, got {}",
                t.relative
            )));
        }

        self.directions.to_sets()?;

        let p = &self.periods;
        if p.initial.trim().is_empty() || p.final_.trim().is_empty() {
            return Err(ReconError::Configuration(
                "period labels must not be empty".into(),
            ));
        }
        if p.initial == p.final_ {
            return Err(ReconError::Configuration(format!(
                "initial and final period labels are both '{}'",
                p.initial
            )));
        }

        if self.top_n == Some(0) {
            return Err(ReconError::Configuration("top_n must be at least 1".into()));
        }

        if let Some(rule) = self.schema.fragments.iter().find(|r| r.fragment.trim().is_empty()) {
            return Err(ReconError::Configuration(format!(
                "empty schema fragment for role '{}'",
                rule.role
            )));
        }
        for role in [Role::Identifier, Role::Quantity] {
            if !self.schema.fragments.iter().any(|r| r.role == role) {
                return Err(ReconError::Configuration(format!(
                    "schema fragments define no rule for role '{role}'"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
