//! Constraint-language parsing and evaluation.
//!
//! The language selects sets of concepts: hierarchy operators (`<`, `<<`,
//! `>`, `>>`), reference-set membership (`^`), boolean composition
//! (`AND`, `OR`, `MINUS`), attribute refinements with cardinality and
//! relationship-group constraints, and dotted attribute traversal.
//!
//! # Example
//!
//! ```
//! use termgraph_engine::ecl::parse_ecl;
//!
//! let node = parse_ecl("< 404684003 : [1..1] { 363698007 = * }").unwrap();
//! // The AST re-serializes to parseable text.
//! assert!(node.to_string().contains("363698007"));
//! ```

pub mod ast;
pub mod evaluator;
pub mod parser;

pub use ast::{AttributeConstraint, EclNode, EclRefinement, ReachMode, RefinementItem};
pub use evaluator::{evaluate, EclPage, EvalContext, Page};
pub use parser::parse_ecl;
