//! Column-role detection for tables with no fixed schema.
//!
//! Matching rules are plain data (`FragmentRule`) so they can be swapped per
//! locale from config. Resolution is deterministic:
//! - roles are resolved in `Role::PRECEDENCE` order
//! - within a role, fragments in ascending priority, then columns in table order
//! - first unbound column containing the fragment wins; a bound role or column
//!   is never reassigned

use crate::config::{FragmentRule, SchemaConfig};
use crate::error::ReconError;
use crate::model::{ColumnMapping, Role};

pub struct SchemaDetector {
    /// Normalized rules, sorted by (role precedence, priority).
    rules: Vec<FragmentRule>,
}

impl SchemaDetector {
    pub fn new(config: &SchemaConfig) -> Self {
        let mut rules: Vec<FragmentRule> = config
            .fragments
            .iter()
            .map(|r| FragmentRule {
                role: r.role,
                fragment: normalize_label(&r.fragment),
                priority: r.priority,
            })
            .filter(|r| !r.fragment.is_empty())
            .collect();
        // Stable: rules with equal priority keep config order.
        rules.sort_by_key(|r| (precedence(r.role), r.priority));
        Self { rules }
    }

    /// Map a table's column labels to roles.
    pub fn detect(&self, source_tag: &str, columns: &[String]) -> Result<ColumnMapping, ReconError> {
        let normalized: Vec<String> = columns.iter().map(|c| normalize_label(c)).collect();
        let mut bound = vec![false; columns.len()];
        let mut mapping = ColumnMapping::default();

        for role in Role::PRECEDENCE {
            'fragments: for rule in self.rules.iter().filter(|r| r.role == role) {
                for (idx, label) in normalized.iter().enumerate() {
                    if !bound[idx] && contains_fragment(label, &rule.fragment) {
                        mapping.bind(role, &columns[idx], false);
                        bound[idx] = true;
                        break 'fragments;
                    }
                }
            }
        }

        if !mapping.has(Role::Quantity) && !mapping.has_split_quantities() {
            return Err(ReconError::Schema {
                source_tag: source_tag.to_string(),
                role: Role::Quantity,
            });
        }

        // A bound name column keys the rows; positional fallback only without one.
        if !mapping.has(Role::Identifier) && !mapping.has(Role::Name) {
            let Some(idx) = bound.iter().position(|b| !b) else {
                return Err(ReconError::Schema {
                    source_tag: source_tag.to_string(),
                    role: Role::Identifier,
                });
            };
            mapping.bind(Role::Identifier, &columns[idx], true);
            bound[idx] = true;
        }

        if !mapping.has(Role::Name) && columns.len() > 1 && !bound[1] {
            mapping.bind(Role::Name, &columns[1], true);
        }

        Ok(mapping)
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new(&SchemaConfig::default())
    }
}

fn precedence(role: Role) -> usize {
    Role::PRECEDENCE
        .iter()
        .position(|r| *r == role)
        .unwrap_or(Role::PRECEDENCE.len())
}

/// Fragments of up to three characters ("id", "cod", "qtd") only match at
/// word boundaries, so "id" never hits "unidade". Longer ones are substrings.
fn contains_fragment(label: &str, fragment: &str) -> bool {
    if fragment.chars().count() > 3 {
        return label.contains(fragment);
    }
    label.match_indices(fragment).any(|(at, _)| {
        let before = label[..at].chars().next_back();
        let after = label[at + fragment.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Lower-case; `_`, `-` and whitespace runs collapse to a single space.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
