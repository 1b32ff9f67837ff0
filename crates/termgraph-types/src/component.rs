//! Component record types.
//!
//! This module provides the versioned component kinds stored by the
//! engine: concepts, descriptions, relationships, and reference-set
//! members. Version intervals and branch scoping live in the engine; these
//! records carry only the payload fields.

use crate::{DefinitionOrigin, Form, SctId};

/// A concept node in the terminology graph.
///
/// # Examples
///
/// ```
/// use termgraph_types::{Concept, DefinitionOrigin};
///
/// let concept = Concept {
///     id: 73211009,
///     active: true,
///     module_id: 900000000000207008,
///     origin: DefinitionOrigin::Statement,
/// };
///
/// assert!(concept.active);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Concept {
    /// Unique identifier for this concept.
    pub id: SctId,
    /// Whether this concept is active (true) or retired (false).
    pub active: bool,
    /// The module containing this concept.
    pub module_id: SctId,
    /// Whether the concept's defining relationships come from OWL axioms
    /// or plain relationship records. Drives the self-grouping rule during
    /// refinement evaluation.
    pub origin: DefinitionOrigin,
}

/// A human-readable description of a concept.
///
/// Edits to a description count as changes to the owning concept when
/// branch changes are diffed for merge review.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Description {
    /// Unique identifier for this description.
    pub id: SctId,
    /// Whether this description is active.
    pub active: bool,
    /// The module containing this description.
    pub module_id: SctId,
    /// The concept this description names.
    pub concept_id: SctId,
    /// The description text.
    pub term: String,
    /// Description type: fully specified name or synonym.
    pub type_id: SctId,
    /// Language code, e.g. "en".
    pub lang: String,
}

impl Description {
    /// Returns true if this is a fully specified name.
    pub fn is_fsn(&self) -> bool {
        self.type_id == crate::well_known::FULLY_SPECIFIED_NAME
    }
}

/// An attribute relationship between two concepts.
///
/// Relationships with `type_id == well_known::IS_A` form the subsumption
/// hierarchy; all other type ids are attribute relationships, optionally
/// grouped by `group` (0 = ungrouped).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relationship {
    /// Unique identifier for this relationship.
    pub id: SctId,
    /// Whether this relationship is active.
    pub active: bool,
    /// The module containing this relationship.
    pub module_id: SctId,
    /// The source concept.
    pub source_id: SctId,
    /// The destination concept (the attribute value).
    pub destination_id: SctId,
    /// The attribute type concept.
    pub type_id: SctId,
    /// Relationship group number. 0 means ungrouped.
    pub group: u16,
    /// Which hierarchy form this relationship belongs to.
    pub form: Form,
}

impl Relationship {
    /// Returns true if this is an is-a (subsumption) relationship.
    pub fn is_is_a(&self) -> bool {
        self.type_id == crate::well_known::IS_A
    }

    /// Returns true if this relationship is grouped (group > 0).
    pub fn is_grouped(&self) -> bool {
        self.group > 0
    }
}

/// A reference-set membership record.
///
/// Links a referenced component (usually a concept) into a reference set.
/// `^X` member-of queries resolve through these records.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefsetMember {
    /// Unique identifier for this member record.
    pub id: SctId,
    /// Whether this membership is active.
    pub active: bool,
    /// The module containing this member.
    pub module_id: SctId,
    /// The reference set this member belongs to.
    pub refset_id: SctId,
    /// The component referenced by this member.
    pub referenced_component_id: SctId,
}
