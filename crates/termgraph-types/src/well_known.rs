//! Well-known concept IDs.
//!
//! This module provides constants for commonly used concept identifiers:
//! the hierarchy root, relationship types, and metadata concepts referenced
//! throughout the engine and its tests.
//!
//! # Examples
//!
//! ```
//! use termgraph_types::well_known;
//!
//! let type_id: u64 = 116680003;
//! assert_eq!(type_id, well_known::IS_A);
//! assert_eq!(well_known::CLINICAL_FINDING, 404684003);
//! ```

use crate::SctId;

// =============================================================================
// Root and Top-Level Hierarchies
// =============================================================================

/// Root concept of the entire hierarchy (138875005).
pub const ROOT: SctId = 138875005;

/// Clinical finding (finding) - 404684003.
pub const CLINICAL_FINDING: SctId = 404684003;

/// Procedure (procedure) - 71388002.
pub const PROCEDURE: SctId = 71388002;

/// Body structure (body structure) - 123037004.
pub const BODY_STRUCTURE: SctId = 123037004;

// =============================================================================
// Relationship Types
// =============================================================================

/// Is a (attribute) - 116680003.
///
/// The subsumption relationship type; the transitive closure is built over
/// active relationships of this type only.
pub const IS_A: SctId = 116680003;

/// Finding site (attribute) - 363698007.
pub const FINDING_SITE: SctId = 363698007;

/// Associated morphology (attribute) - 116676008.
pub const ASSOCIATED_MORPHOLOGY: SctId = 116676008;

/// Procedure site (attribute) - 363704007.
pub const PROCEDURE_SITE: SctId = 363704007;

/// Laterality (attribute) - 272741003.
pub const LATERALITY: SctId = 272741003;

// =============================================================================
// Modules and Metadata
// =============================================================================

/// Fully specified name (description type) - 900000000000003001.
pub const FULLY_SPECIFIED_NAME: SctId = 900000000000003001;

/// Synonym (description type) - 900000000000013009.
pub const SYNONYM: SctId = 900000000000013009;

/// Core module - 900000000000207008.
pub const CORE_MODULE: SctId = 900000000000207008;

/// Model component module - 900000000000012004.
pub const MODEL_MODULE: SctId = 900000000000012004;

/// Mandatory concept model rule strength - 723597001.
pub const MANDATORY_CONCEPT_MODEL_RULE: SctId = 723597001;

/// Optional concept model rule strength - 723598006.
pub const OPTIONAL_CONCEPT_MODEL_RULE: SctId = 723598006;
