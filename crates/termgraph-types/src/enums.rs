//! Enumeration types for the terminology graph.
//!
//! This module provides the stated/inferred form distinction and the
//! per-concept definition origin flag used by refinement evaluation.

use crate::SctId;

/// The form of a relationship hierarchy.
///
/// The graph maintains two parallel hierarchies: the *stated* form holds
/// author-asserted relationships, the *inferred* form holds
/// classifier-computed relationships. Closure indexes and queries are always
/// scoped to one form.
///
/// # Examples
///
/// ```
/// use termgraph_types::Form;
///
/// let form = Form::from_id(900000000000011006);
/// assert_eq!(form, Some(Form::Inferred));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Form {
    /// Author-asserted relationships.
    Stated,
    /// Classifier-computed relationships.
    Inferred,
}

impl Form {
    /// Characteristic type SCTID for stated relationships.
    pub const STATED_ID: SctId = 900000000000010007;
    /// Characteristic type SCTID for inferred relationships.
    pub const INFERRED_ID: SctId = 900000000000011006;

    /// Creates a Form from its characteristic type SCTID.
    ///
    /// Returns `None` if the ID doesn't match a known characteristic type.
    pub fn from_id(id: SctId) -> Option<Self> {
        match id {
            Self::STATED_ID => Some(Self::Stated),
            Self::INFERRED_ID => Some(Self::Inferred),
            _ => None,
        }
    }

    /// Returns the characteristic type SCTID for this form.
    pub fn to_id(self) -> SctId {
        match self {
            Self::Stated => Self::STATED_ID,
            Self::Inferred => Self::INFERRED_ID,
        }
    }
}

/// The origin of a concept's defining relationships.
///
/// Concepts defined through OWL axioms model every ungrouped non-is-a
/// attribute as its own relationship group (the axiom self-grouping rule).
/// Concepts defined through plain relationship rows keep group 0 as
/// genuinely ungrouped content. Refinement evaluation with group cardinality
/// bounds needs to know which rule applies, so the origin is recorded per
/// concept rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefinitionOrigin {
    /// Defining relationships derive from OWL axiom expressions.
    Axiom,
    /// Defining relationships derive from plain relationship records.
    Statement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_from_id() {
        assert_eq!(Form::from_id(Form::STATED_ID), Some(Form::Stated));
        assert_eq!(Form::from_id(Form::INFERRED_ID), Some(Form::Inferred));
        assert_eq!(Form::from_id(12345), None);
    }

    #[test]
    fn test_form_roundtrip() {
        for form in [Form::Stated, Form::Inferred] {
            assert_eq!(Form::from_id(form.to_id()), Some(form));
        }
    }
}
