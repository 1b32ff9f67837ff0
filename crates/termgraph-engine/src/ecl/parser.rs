//! Recursive-descent parser for the constraint language.
//!
//! Grammar, loosest-binding first:
//!
//! ```text
//! expression  := conjunction (OR conjunction)*
//! conjunction := exclusion (AND exclusion)*
//! exclusion   := refinable (MINUS refinable)*
//! refinable   := dotted (':' refinement)?
//! dotted      := subexpr ('.' subexpr)*
//! subexpr     := '^' subexpr
//!              | '(' expression ')'
//!              | operator? ('*' | sctid term?)
//! refinement  := item (',' item)*
//! item        := cardinality? '{' attribute (',' attribute)* '}'
//!              | attribute
//! attribute   := cardinality? subexpr '=' subexpr
//! cardinality := '[' digits '..' (digits | '*') ']'
//! operator    := '<<' | '<' | '>>' | '>'
//! term        := '|' [^|]* '|'
//! sctid       := digits
//! ```
//!
//! Keywords are upper-case only. Errors carry the byte offset of the
//! offending token so callers can point at the query text.

use termgraph_types::{Cardinality, SctId};

use crate::ecl::ast::{
    AttributeConstraint, EclNode, EclRefinement, ReachMode, RefinementItem,
};
use crate::error::{EngineError, EngineResult};

/// Parses constraint text into an AST.
///
/// # Example
///
/// ```
/// use termgraph_engine::ecl::parse_ecl;
///
/// let node = parse_ecl("<< 404684003 |Clinical finding|").unwrap();
/// assert_eq!(node.to_string(), "<< 404684003 |Clinical finding|");
/// ```
pub fn parse_ecl(text: &str) -> EngineResult<EclNode> {
    let mut parser = Parser {
        src: text.as_bytes(),
        pos: 0,
    };
    let node = parser.expression()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(node)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> EngineError {
        EngineError::SyntaxError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    /// Consumes `literal` if it is next, preferring the longest match at
    /// the call site (callers must test `"<<"` before `"<"`).
    fn eat(&mut self, literal: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Consumes an upper-case keyword followed by a non-word boundary.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        if !rest.starts_with(keyword.as_bytes()) {
            return false;
        }
        match rest.get(keyword.len()) {
            Some(b) if b.is_ascii_alphanumeric() => false,
            _ => {
                self.pos += keyword.len();
                true
            }
        }
    }

    fn expect(&mut self, literal: &str) -> EngineResult<()> {
        if self.eat(literal) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", literal)))
        }
    }

    fn number(&mut self) -> EngineResult<u64> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a number"));
        }
        // Guaranteed ASCII digits, so both conversions are infallible in
        // practice; overflow of u64 still surfaces as a syntax error.
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| self.error("number out of range"))
    }

    fn expression(&mut self) -> EngineResult<EclNode> {
        let first = self.conjunction()?;
        let mut items = vec![first];
        while self.eat_keyword("OR") {
            items.push(self.conjunction()?);
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap_or(EclNode::Wildcard))
        } else {
            Ok(EclNode::Or(items))
        }
    }

    fn conjunction(&mut self) -> EngineResult<EclNode> {
        let first = self.exclusion()?;
        let mut items = vec![first];
        while self.eat_keyword("AND") {
            items.push(self.exclusion()?);
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap_or(EclNode::Wildcard))
        } else {
            Ok(EclNode::And(items))
        }
    }

    fn exclusion(&mut self) -> EngineResult<EclNode> {
        let mut node = self.refinable()?;
        while self.eat_keyword("MINUS") {
            let right = self.refinable()?;
            node = EclNode::Minus(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn refinable(&mut self) -> EngineResult<EclNode> {
        let focus = self.dotted()?;
        if self.eat(":") {
            let refinement = self.refinement()?;
            Ok(EclNode::Refined {
                focus: Box::new(focus),
                refinement,
            })
        } else {
            Ok(focus)
        }
    }

    fn dotted(&mut self) -> EngineResult<EclNode> {
        let mut node = self.subexpr()?;
        while self.peek() == Some(b'.') && !self.src[self.pos + 1..].starts_with(b".") {
            self.pos += 1;
            let attribute = self.subexpr()?;
            node = EclNode::Dotted {
                focus: Box::new(node),
                attribute: Box::new(attribute),
            };
        }
        Ok(node)
    }

    fn subexpr(&mut self) -> EngineResult<EclNode> {
        if self.eat("^") {
            let inner = self.subexpr()?;
            return Ok(EclNode::MemberOf(Box::new(inner)));
        }
        if self.eat("(") {
            let inner = self.expression()?;
            self.expect(")")?;
            return Ok(inner);
        }
        let mode = self.reach_mode();
        if self.eat("*") {
            // An operator in front of '*' adds nothing: descendants-of-any
            // is still any.
            return Ok(EclNode::Wildcard);
        }
        let id: SctId = self.number()?;
        let term = self.term_annotation()?;
        Ok(EclNode::ConceptRef { mode, id, term })
    }

    fn reach_mode(&mut self) -> ReachMode {
        if self.eat("<<") {
            ReachMode::DescendantOrSelf
        } else if self.eat("<") {
            ReachMode::Descendant
        } else if self.eat(">>") {
            ReachMode::AncestorOrSelf
        } else if self.eat(">") {
            ReachMode::Ancestor
        } else {
            ReachMode::SelfOnly
        }
    }

    fn term_annotation(&mut self) -> EngineResult<Option<String>> {
        if !self.eat("|") {
            return Ok(None);
        }
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != b'|' {
            self.pos += 1;
        }
        if self.pos == self.src.len() {
            return Err(self.error("unterminated term annotation"));
        }
        let term = String::from_utf8_lossy(&self.src[start..self.pos])
            .trim()
            .to_string();
        self.pos += 1;
        Ok(Some(term))
    }

    fn refinement(&mut self) -> EngineResult<EclRefinement> {
        let first = self.refinement_item()?;
        let mut items = vec![first];
        while self.eat(",") {
            items.push(self.refinement_item()?);
        }
        Ok(EclRefinement { items })
    }

    fn refinement_item(&mut self) -> EngineResult<RefinementItem> {
        let cardinality = self.cardinality()?;
        if self.eat("{") {
            let mut attributes = vec![self.attribute_constraint()?];
            while self.eat(",") {
                attributes.push(self.attribute_constraint()?);
            }
            self.expect("}")?;
            Ok(RefinementItem::Group {
                cardinality,
                attributes,
            })
        } else {
            let mut attribute = self.attribute_constraint()?;
            if attribute.cardinality.is_none() {
                attribute.cardinality = cardinality;
            }
            Ok(RefinementItem::Attribute(attribute))
        }
    }

    fn attribute_constraint(&mut self) -> EngineResult<AttributeConstraint> {
        let cardinality = self.cardinality()?;
        let attribute = self.subexpr()?;
        self.expect("=")?;
        let value = self.subexpr()?;
        Ok(AttributeConstraint {
            cardinality,
            attribute: Box::new(attribute),
            value: Box::new(value),
        })
    }

    fn cardinality(&mut self) -> EngineResult<Option<Cardinality>> {
        if !self.eat("[") {
            return Ok(None);
        }
        let min = self.number()?;
        self.expect("..")?;
        let max = if self.eat("*") {
            None
        } else {
            Some(self.number()?)
        };
        self.expect("]")?;
        let min = u32::try_from(min).map_err(|_| self.error("cardinality out of range"))?;
        let max = max
            .map(u32::try_from)
            .transpose()
            .map_err(|_| self.error("cardinality out of range"))?;
        if let Some(max) = max {
            if max < min {
                return Err(self.error("cardinality max is below min"));
            }
        }
        Ok(Some(Cardinality { min, max }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) -> String {
        parse_ecl(text).unwrap().to_string()
    }

    #[test]
    fn test_parse_self() {
        let node = parse_ecl("404684003").unwrap();
        assert_eq!(
            node,
            EclNode::ConceptRef {
                mode: ReachMode::SelfOnly,
                id: 404684003,
                term: None,
            }
        );
    }

    #[test]
    fn test_parse_operators() {
        for (text, mode) in [
            ("< 404684003", ReachMode::Descendant),
            ("<< 404684003", ReachMode::DescendantOrSelf),
            ("> 404684003", ReachMode::Ancestor),
            (">> 404684003", ReachMode::AncestorOrSelf),
        ] {
            let node = parse_ecl(text).unwrap();
            assert_eq!(
                node,
                EclNode::ConceptRef {
                    mode,
                    id: 404684003,
                    term: None,
                },
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_parse_term_annotation() {
        let node = parse_ecl("<< 73211009 |Diabetes mellitus|").unwrap();
        assert_eq!(
            node,
            EclNode::ConceptRef {
                mode: ReachMode::DescendantOrSelf,
                id: 73211009,
                term: Some("Diabetes mellitus".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_wildcard_and_member_of() {
        assert_eq!(parse_ecl("*").unwrap(), EclNode::Wildcard);
        assert_eq!(parse_ecl("< *").unwrap(), EclNode::Wildcard);
        assert_eq!(
            parse_ecl("^ *").unwrap(),
            EclNode::MemberOf(Box::new(EclNode::Wildcard))
        );
    }

    #[test]
    fn test_precedence_or_binds_loosest() {
        // a AND b OR c == (a AND b) OR c
        let node = parse_ecl("1 AND 2 OR 3").unwrap();
        match node {
            EclNode::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], EclNode::And(_)));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_minus_binds_tighter_than_and() {
        let node = parse_ecl("1 AND 2 MINUS 3").unwrap();
        match node {
            EclNode::And(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], EclNode::Minus(_, _)));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let node = parse_ecl("(1 OR 2) AND 3").unwrap();
        match node {
            EclNode::And(items) => assert!(matches!(items[0], EclNode::Or(_))),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_refinement() {
        let node = parse_ecl("< 404684003 : 363698007 = << 123037004").unwrap();
        match node {
            EclNode::Refined { refinement, .. } => {
                assert_eq!(refinement.items.len(), 1);
                match &refinement.items[0] {
                    RefinementItem::Attribute(attribute) => {
                        assert!(attribute.cardinality.is_none());
                    }
                    other => panic!("expected Attribute, got {:?}", other),
                }
            }
            other => panic!("expected Refined, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_grouped_refinement_with_cardinality() {
        let node = parse_ecl("< 404684003 : [1..1] { 363698007 = * }").unwrap();
        match node {
            EclNode::Refined { refinement, .. } => match &refinement.items[0] {
                RefinementItem::Group {
                    cardinality,
                    attributes,
                } => {
                    assert_eq!(*cardinality, Some(Cardinality::required()));
                    assert_eq!(attributes.len(), 1);
                }
                other => panic!("expected Group, got {:?}", other),
            },
            other => panic!("expected Refined, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_attribute_cardinality() {
        let node = parse_ecl("< 404684003 : [2..*] 363698007 = *").unwrap();
        match node {
            EclNode::Refined { refinement, .. } => match &refinement.items[0] {
                RefinementItem::Attribute(attribute) => {
                    assert_eq!(
                        attribute.cardinality,
                        Some(Cardinality { min: 2, max: None })
                    );
                }
                other => panic!("expected Attribute, got {:?}", other),
            },
            other => panic!("expected Refined, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_dotted() {
        let node = parse_ecl("< 404684003 . 363698007").unwrap();
        assert!(matches!(node, EclNode::Dotted { .. }));
    }

    #[test]
    fn test_lowercase_keywords_rejected() {
        assert!(parse_ecl("1 or 2").is_err());
        assert!(parse_ecl("1 and 2").is_err());
    }

    #[test]
    fn test_error_position() {
        match parse_ecl("<< 404684003 :") {
            Err(EngineError::SyntaxError { position, .. }) => assert_eq!(position, 14),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(parse_ecl("<< ").is_err());
        assert!(parse_ecl("(1 OR 2").is_err());
        assert!(parse_ecl("1 2").is_err());
    }

    #[test]
    fn test_cardinality_bounds_validated() {
        assert!(parse_ecl("< 1 : [3..2] { 2 = * }").is_err());
        assert!(parse_ecl("< 1 : [0..*] { 2 = * }").is_ok());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in [
            "<< 404684003",
            "< 404684003 : [1..1] { 363698007 = * }",
            "(<< 404684003 MINUS << 73211009) AND ^ 723264001",
            "< 404684003 . 363698007",
            "< 404684003 : [0..0] 363698007 = *, 116676008 = << 123037004",
        ] {
            let once = roundtrip(text);
            assert_eq!(roundtrip(&once), once, "{}", text);
        }
    }
}
