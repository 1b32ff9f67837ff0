//! MRCM (Machine Readable Concept Model) rule records.
//!
//! These records describe which attributes may be applied in which semantic
//! domains, with what cardinality, and what their value ranges are. The
//! engine consumes them read-only through its rule registry; loading and
//! XML/refset parsing happen outside this workspace.

use crate::{Cardinality, SctId};

/// An attribute-domain rule.
///
/// States that an attribute is valid within a domain, whether it must be
/// grouped, and its overall and in-group cardinality.
///
/// # Example
///
/// A rule might specify that "Finding site" (363698007) is valid in the
/// "Clinical finding" domain with cardinality 0..* overall and 0..1 within
/// a relationship group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeDomainRule {
    /// The attribute concept this rule constrains.
    pub attribute_id: SctId,
    /// The domain concept where the attribute applies.
    pub domain_id: SctId,
    /// Whether this attribute must appear inside a relationship group.
    pub grouped: bool,
    /// Overall cardinality for this attribute on a concept.
    pub attribute_cardinality: Cardinality,
    /// Cardinality within a single relationship group.
    pub attribute_in_group_cardinality: Cardinality,
    /// Rule strength: mandatory (723597001) or optional (723598006).
    pub rule_strength_id: SctId,
}

impl AttributeDomainRule {
    /// Returns true if this is a mandatory rule.
    pub fn is_mandatory(&self) -> bool {
        self.rule_strength_id == crate::well_known::MANDATORY_CONCEPT_MODEL_RULE
    }
}

/// An attribute-range rule.
///
/// Constrains the valid values of an attribute with a constraint-language
/// expression, e.g. "Finding site" values must satisfy `<< 123037004`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeRangeRule {
    /// The attribute concept this rule constrains.
    pub attribute_id: SctId,
    /// Constraint-language expression defining valid values.
    pub range_constraint: String,
    /// Rule strength: mandatory (723597001) or optional (723598006).
    pub rule_strength_id: SctId,
}

impl AttributeRangeRule {
    /// Returns true if this is a mandatory rule.
    pub fn is_mandatory(&self) -> bool {
        self.rule_strength_id == crate::well_known::MANDATORY_CONCEPT_MODEL_RULE
    }
}
