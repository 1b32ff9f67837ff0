//! Branch-scoped registry of concept-model (MRCM) rules.
//!
//! Rules are loaded per branch path and read via longest-ancestor-path
//! match, so a branch without its own rule set sees its nearest ancestor's.
//! Reload swaps the whole rule map behind an `Arc`, so readers never see a
//! half-updated set and never block a load.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use termgraph_types::{AttributeDomainRule, AttributeRangeRule, SctId};

use crate::branch::parent_of;

/// The concept-model rules applicable on one branch.
#[derive(Debug, Clone, Default)]
pub struct MrcmRules {
    /// Which attributes may appear on which domains, with grouping and
    /// cardinality constraints.
    pub attribute_domain: Vec<AttributeDomainRule>,
    /// Permitted value ranges per attribute, as constraint expressions.
    pub attribute_range: Vec<AttributeRangeRule>,
}

impl MrcmRules {
    /// Domain rules for one attribute.
    pub fn domain_rules_for(&self, attribute_id: SctId) -> Vec<&AttributeDomainRule> {
        self.attribute_domain
            .iter()
            .filter(|rule| rule.attribute_id == attribute_id)
            .collect()
    }

    /// Range rules for one attribute.
    pub fn range_rules_for(&self, attribute_id: SctId) -> Vec<&AttributeRangeRule> {
        self.attribute_range
            .iter()
            .filter(|rule| rule.attribute_id == attribute_id)
            .collect()
    }
}

/// Process-wide rule registry keyed by branch path.
#[derive(Default)]
pub struct MrcmRegistry {
    rules: RwLock<Arc<HashMap<String, Arc<MrcmRules>>>>,
}

impl MrcmRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rules for one branch path. Readers holding the
    /// previous map keep reading it unchanged.
    pub fn load(&self, path: &str, rules: MrcmRules) {
        let mut guard = self.rules.write();
        let mut map = (**guard).clone();
        map.insert(path.to_string(), Arc::new(rules));
        *guard = Arc::new(map);
        tracing::info!(branch = path, "concept-model rules loaded");
    }

    /// Rules for a branch: the entry at the path itself, otherwise the
    /// nearest ancestor's entry, otherwise `None`.
    pub fn rules_for_branch(&self, path: &str) -> Option<Arc<MrcmRules>> {
        let map = self.rules.read().clone();
        let mut current = Some(path);
        while let Some(path) = current {
            if let Some(rules) = map.get(path) {
                return Some(rules.clone());
            }
            current = parent_of(path);
        }
        None
    }
}
