//! # termgraph-types
//!
//! Type definitions for the versioned terminology graph engine.
//!
//! This crate provides the domain vocabulary shared by the engine crates:
//! concept identifiers, component records (concepts, descriptions,
//! relationships, reference-set members), the stated/inferred form
//! distinction,
//! cardinality bounds, and MRCM attribute rules.
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!   Disable this feature for zero-dependency usage.
//!
//! ## Usage
//!
//! ```rust
//! use termgraph_types::{Concept, Relationship, SctId, Form, DefinitionOrigin};
//! use termgraph_types::well_known;
//!
//! // A concept authored through OWL axioms
//! let concept = Concept {
//!     id: 73211009,
//!     active: true,
//!     module_id: well_known::CORE_MODULE,
//!     origin: DefinitionOrigin::Axiom,
//! };
//!
//! // An is-a edge in the inferred hierarchy
//! let edge = Relationship {
//!     id: 1,
//!     active: true,
//!     module_id: well_known::CORE_MODULE,
//!     source_id: 73211009,
//!     destination_id: well_known::CLINICAL_FINDING,
//!     type_id: well_known::IS_A,
//!     group: 0,
//!     form: Form::Inferred,
//! };
//!
//! assert!(edge.is_is_a());
//! assert_eq!(concept.origin, DefinitionOrigin::Axiom);
//! ```
//!
//! ## Without Serde
//!
//! To use this crate without serde (zero dependencies):
//!
//! ```toml
//! [dependencies]
//! termgraph-types = { version = "0.1", default-features = false }
//! ```

#![warn(missing_docs)]

mod cardinality;
mod component;
mod enums;
pub mod mrcm;
mod sctid;
pub mod well_known;

pub use cardinality::{Cardinality, CardinalityParseError};
pub use component::{Concept, Description, RefsetMember, Relationship};
pub use enums::{DefinitionOrigin, Form};
pub use mrcm::{AttributeDomainRule, AttributeRangeRule};
pub use sctid::SctId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_are_exported() {
        let _id: SctId = 73211009;
        let _form = Form::Inferred;
        let _origin = DefinitionOrigin::Statement;
        let _card = Cardinality::unbounded();
    }

    #[test]
    fn test_well_known_accessible() {
        assert_eq!(well_known::IS_A, 116680003);
        assert_eq!(well_known::CLINICAL_FINDING, 404684003);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let concept = Concept {
            id: 404684003,
            active: true,
            module_id: 900000000000207008,
            origin: DefinitionOrigin::Statement,
        };

        let json = serde_json::to_string(&concept).unwrap();
        let parsed: Concept = serde_json::from_str(&json).unwrap();
        assert_eq!(concept, parsed);
    }
}
