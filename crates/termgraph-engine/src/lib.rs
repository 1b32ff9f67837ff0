//! Versioned terminology graph engine.
//!
//! An in-memory, git-like branching model over a concept hierarchy:
//! branches fork from `MAIN`, commits are copy-on-write component
//! versions, and queries are expressed in an ECL-subset constraint
//! language evaluated against per-branch transitive-closure caches.
//!
//! The pieces:
//!
//! - [`branch`] — the branch tree, timepoints, and visibility snapshots
//! - [`version`] — copy-on-write versioned component storage
//! - [`closure`] — per-branch ancestor/descendant closure index
//! - [`ecl`] — constraint-language parser and evaluator
//! - [`review`] — merge reviews between branch pairs
//! - [`mrcm`] — concept-model rule registry
//! - [`store`] — the [`GraphStore`] facade tying it all together
//!
//! # Example
//!
//! ```
//! use termgraph_engine::{Commit, GraphStore};
//! use termgraph_types::{well_known, Concept, DefinitionOrigin, Form, Relationship};
//!
//! let store = GraphStore::new();
//!
//! let mut commit = Commit::new();
//! for id in [well_known::ROOT, well_known::CLINICAL_FINDING] {
//!     commit.concepts.push(Concept {
//!         id,
//!         active: true,
//!         module_id: well_known::CORE_MODULE,
//!         origin: DefinitionOrigin::Statement,
//!     });
//! }
//! commit.relationships.push(Relationship {
//!     id: 1,
//!     active: true,
//!     module_id: well_known::CORE_MODULE,
//!     source_id: well_known::CLINICAL_FINDING,
//!     destination_id: well_known::ROOT,
//!     type_id: well_known::IS_A,
//!     group: 0,
//!     form: Form::Inferred,
//! });
//! store.commit("MAIN", commit).unwrap();
//!
//! let page = store
//!     .select_concept_ids(
//!         &format!("< {}", well_known::ROOT),
//!         "MAIN",
//!         Form::Inferred,
//!         None,
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(page.ids, vec![well_known::CLINICAL_FINDING]);
//! ```

#![warn(missing_docs)]

pub mod branch;
pub mod closure;
pub mod ecl;
pub mod error;
pub mod mrcm;
pub mod review;
pub mod store;
pub mod version;

pub use branch::{parse_branch_uri, Branch, BranchSnapshot, BranchStore, Timepoint, MAIN};
pub use closure::{BranchClosure, ClosureIndex};
pub use ecl::{parse_ecl, EclNode, EclPage, Page};
pub use error::{EngineError, EngineResult};
pub use mrcm::{MrcmRegistry, MrcmRules};
pub use review::{ConflictEntry, MergeReview, ReviewId, ReviewStatus};
pub use store::{Commit, GraphStore};
pub use version::{Component, ComponentVersion, VersionedStore};
