//! Constraint-language abstract syntax tree.
//!
//! A closed sum type: one evaluation function pattern-matches over the
//! variants, which keeps handling exhaustive when the language grows.
//! `Display` re-serializes a node to text the parser accepts again, so a
//! compiled constraint can be round-tripped.

use std::fmt;

use termgraph_types::{Cardinality, SctId};

/// How a concept reference reaches through the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachMode {
    /// The concept itself.
    SelfOnly,
    /// Proper descendants (`<`).
    Descendant,
    /// The concept and its descendants (`<<`).
    DescendantOrSelf,
    /// Proper ancestors (`>`).
    Ancestor,
    /// The concept and its ancestors (`>>`).
    AncestorOrSelf,
}

impl ReachMode {
    fn token(self) -> &'static str {
        match self {
            Self::SelfOnly => "",
            Self::Descendant => "< ",
            Self::DescendantOrSelf => "<< ",
            Self::Ancestor => "> ",
            Self::AncestorOrSelf => ">> ",
        }
    }
}

/// A node of the compiled constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EclNode {
    /// `*` - any concept.
    Wildcard,
    /// A concept reference with a reachability mode and optional `|term|`
    /// annotation (kept for display, ignored by evaluation).
    ConceptRef {
        /// Reachability mode.
        mode: ReachMode,
        /// The referenced concept.
        id: SctId,
        /// Human-readable term annotation, if present in the source text.
        term: Option<String>,
    },
    /// `^ X` - active members of the reference set(s) denoted by the inner
    /// expression (`^ *` unions all reference sets).
    MemberOf(Box<EclNode>),
    /// `A AND B AND ...` - set intersection.
    And(Vec<EclNode>),
    /// `A OR B OR ...` - set union.
    Or(Vec<EclNode>),
    /// `A MINUS B` - set difference.
    Minus(Box<EclNode>, Box<EclNode>),
    /// `focus : refinement` - attribute refinement of a focus set.
    Refined {
        /// The focus expression being refined.
        focus: Box<EclNode>,
        /// The refinement applied to each candidate.
        refinement: EclRefinement,
    },
    /// `focus . attribute` - the attribute *values* of the focus concepts.
    Dotted {
        /// The source concept set.
        focus: Box<EclNode>,
        /// The attribute type expression.
        attribute: Box<EclNode>,
    },
}

/// A refinement: one or more comma-separated (conjunctive) items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclRefinement {
    /// The conjunctive items; every item must match.
    pub items: Vec<RefinementItem>,
}

/// One item of a refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementItem {
    /// An attribute constraint matched against relationships in any group.
    Attribute(AttributeConstraint),
    /// `[min..max] { a, b }` - attributes that must co-occur within the
    /// same relationship group; the cardinality bounds how many distinct
    /// groups qualify.
    Group {
        /// Bounds on the number of qualifying groups. `None` means
        /// "at least one".
        cardinality: Option<Cardinality>,
        /// The attribute constraints that must all hold within one group.
        attributes: Vec<AttributeConstraint>,
    },
}

/// An `attribute = value` pair, both sides arbitrary subexpressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConstraint {
    /// Bounds on the number of matching relationships. `None` means
    /// "at least one".
    pub cardinality: Option<Cardinality>,
    /// The attribute type expression (often `<< type` or `*`).
    pub attribute: Box<EclNode>,
    /// The value expression; evaluation recurses into it.
    pub value: Box<EclNode>,
}

impl EclNode {
    /// True for nodes that never need parentheses when nested.
    fn is_leaf(&self) -> bool {
        matches!(self, Self::Wildcard | Self::ConceptRef { .. })
    }
}

/// Writes `node`, parenthesized unless it is a leaf.
fn fmt_operand(node: &EclNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if node.is_leaf() {
        write!(f, "{}", node)
    } else {
        write!(f, "({})", node)
    }
}

impl fmt::Display for EclNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::ConceptRef { mode, id, term } => {
                write!(f, "{}{}", mode.token(), id)?;
                if let Some(term) = term {
                    write!(f, " |{}|", term)?;
                }
                Ok(())
            }
            Self::MemberOf(inner) => {
                write!(f, "^ ")?;
                fmt_operand(inner, f)
            }
            Self::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    fmt_operand(item, f)?;
                }
                Ok(())
            }
            Self::Or(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    fmt_operand(item, f)?;
                }
                Ok(())
            }
            Self::Minus(left, right) => {
                fmt_operand(left, f)?;
                write!(f, " MINUS ")?;
                fmt_operand(right, f)
            }
            Self::Refined { focus, refinement } => {
                fmt_operand(focus, f)?;
                write!(f, " : {}", refinement)
            }
            Self::Dotted { focus, attribute } => {
                fmt_operand(focus, f)?;
                write!(f, " . ")?;
                fmt_operand(attribute, f)
            }
        }
    }
}

impl fmt::Display for EclRefinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

impl fmt::Display for RefinementItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(attribute) => write!(f, "{}", attribute),
            Self::Group {
                cardinality,
                attributes,
            } => {
                if let Some(cardinality) = cardinality {
                    write!(f, "[{}] ", cardinality)?;
                }
                write!(f, "{{ ")?;
                for (i, attribute) in attributes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", attribute)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl fmt::Display for AttributeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cardinality) = &self.cardinality {
            write!(f, "[{}] ", cardinality)?;
        }
        fmt_operand(&self.attribute, f)?;
        write!(f, " = ")?;
        fmt_operand(&self.value, f)
    }
}
