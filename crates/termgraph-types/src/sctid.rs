//! Concept identifier (SCTID) type.
//!
//! This module provides a type alias for terminology concept identifiers.
//! Identifiers are 64-bit unsigned integers that uniquely identify components
//! within the terminology graph.

/// A terminology concept identifier (SCTID).
///
/// Identifiers are 64-bit unsigned integers that uniquely identify concepts,
/// relationships, and reference-set members within the graph.
///
/// # Examples
///
/// ```
/// use termgraph_types::SctId;
///
/// let concept_id: SctId = 73211009; // Diabetes mellitus
/// let is_a_type: SctId = 116680003; // IS_A relationship type
/// ```
pub type SctId = u64;
