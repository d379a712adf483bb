// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Defines the AST structure of a compiled TQL query

use std::fmt;
use std::fmt::Display;

use regex::Regex;

use crate::shape::Shape;
use crate::tokenizer::Span;

/// A compiled query: the pattern expression together with its precomputed result shape.
///
/// Patterns are deeply immutable.  A pattern may be reused across documents and shared across
/// threads; each `matches` call owns its private cursor state.
#[derive(Debug)]
pub struct Pattern {
    pub(crate) expr: Expr,
    pub(crate) shape: Shape,
}

impl Pattern {
    /// The static shape every result of this pattern has.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.expr.fmt(f)
    }
}

/// The two traversal axes of a query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Axis {
    /// Parent to child
    Depth,
    /// Sibling to sibling
    Breadth,
}

impl Axis {
    pub fn opposite(self) -> Axis {
        match self {
            Axis::Depth => Axis::Breadth,
            Axis::Breadth => Axis::Depth,
        }
    }

    /// The single-step edge of this axis (`>` or `:`).
    pub fn direct_edge(self) -> Edge {
        match self {
            Axis::Depth => Edge::Direct,
            Axis::Breadth => Edge::Adjacent,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Axis::Depth => "depth",
            Axis::Breadth => "breadth",
        })
    }
}

/// The connective between two consecutive terms of a sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    /// `>`: the next term matches a direct child
    Direct,
    /// `>>`: the next term matches any descendant
    Descendant,
    /// `:`: the next term matches the immediately following sibling
    Adjacent,
    /// `::`: the next term matches some following sibling
    Following,
}

impl Edge {
    pub fn axis(self) -> Axis {
        match self {
            Edge::Direct | Edge::Descendant => Axis::Depth,
            Edge::Adjacent | Edge::Following => Axis::Breadth,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Edge::Direct => ">",
            Edge::Descendant => ">>",
            Edge::Adjacent => ":",
            Edge::Following => "::",
        })
    }
}

/// A pattern expression
#[derive(Debug, PartialEq)]
pub enum Expr {
    Element(ElementExpr),
    Boundary(BoundaryExpr),
    Seq(SeqExpr),
    Alt(AltExpr),
    Opt(OptExpr),
    Repeat(RepeatExpr),
    Group(GroupExpr),
    Extract(ExtractExpr),
    Guard(GuardExpr),
    Switch(SwitchExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Element(e) => e.span,
            Expr::Boundary(e) => e.span,
            Expr::Seq(e) => e.span,
            Expr::Alt(e) => e.span,
            Expr::Opt(e) => e.span,
            Expr::Repeat(e) => e.span,
            Expr::Group(e) => e.span,
            Expr::Extract(e) => e.span,
            Expr::Guard(e) => e.span,
            Expr::Switch(e) => e.span,
        }
    }

    /// Whether any extractor appears in this subtree.
    pub(crate) fn has_extractors(&self) -> bool {
        match self {
            Expr::Element(_) | Expr::Boundary(_) => false,
            Expr::Seq(e) => e.children.iter().any(Expr::has_extractors),
            Expr::Alt(e) => e.arms.iter().any(Expr::has_extractors),
            Expr::Opt(e) => e.expr.has_extractors(),
            Expr::Repeat(e) => e.expr.has_extractors(),
            Expr::Group(e) => e.expr.has_extractors(),
            Expr::Extract(e) => !e.extractors.is_empty() || e.expr.has_extractors(),
            Expr::Guard(e) => e.expr.has_extractors(),
            Expr::Switch(e) => {
                e.head.as_ref().map_or(false, |head| head.has_extractors())
                    || e.body.has_extractors()
            }
        }
    }

    /// Collects the names of all `$name` filter references, in source order.
    pub(crate) fn filter_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Expr::Element(_) | Expr::Boundary(_) => {}
            Expr::Seq(e) => e.children.iter().for_each(|c| c.filter_refs(refs)),
            Expr::Alt(e) => e.arms.iter().for_each(|a| a.filter_refs(refs)),
            Expr::Opt(e) => e.expr.filter_refs(refs),
            Expr::Repeat(e) => e.expr.filter_refs(refs),
            Expr::Group(e) => e.expr.filter_refs(refs),
            Expr::Extract(e) => e.expr.filter_refs(refs),
            Expr::Guard(e) => {
                e.expr.filter_refs(refs);
                e.filter.calls(refs);
            }
            Expr::Switch(e) => {
                if let Some(head) = &e.head {
                    head.filter_refs(refs);
                }
                e.body.filter_refs(refs);
            }
        }
    }

    /// Whether the pattern's first term is `$` on the depth axis, anchoring it to the
    /// enumeration root.
    pub(crate) fn is_anchored(&self) -> bool {
        match self {
            Expr::Boundary(b) => b.axis == Axis::Depth,
            Expr::Seq(e) => e.children.first().map_or(false, Expr::is_anchored),
            Expr::Alt(e) => !e.arms.is_empty() && e.arms.iter().all(Expr::is_anchored),
            Expr::Group(e) => e.expr.is_anchored(),
            Expr::Extract(e) => e.expr.is_anchored(),
            Expr::Guard(e) => e.expr.is_anchored(),
            _ => false,
        }
    }
}

/// A selector primary: one element, matched by a conjunction of tag tests
#[derive(Debug, PartialEq)]
pub struct ElementExpr {
    pub selector: Selector,
    pub axis: Axis,
    pub span: Span,
}

impl From<ElementExpr> for Expr {
    fn from(expr: ElementExpr) -> Expr {
        Expr::Element(expr)
    }
}

/// The `$` edge assertion
#[derive(Debug, PartialEq)]
pub struct BoundaryExpr {
    pub axis: Axis,
    pub span: Span,
}

impl From<BoundaryExpr> for Expr {
    fn from(expr: BoundaryExpr) -> Expr {
        Expr::Boundary(expr)
    }
}

/// A sequence of terms along one axis
#[derive(Debug, PartialEq)]
pub struct SeqExpr {
    pub axis: Axis,
    pub children: Vec<Expr>,
    /// One edge between each consecutive pair of children.
    pub edges: Vec<Edge>,
    pub span: Span,
}

impl From<SeqExpr> for Expr {
    fn from(expr: SeqExpr) -> Expr {
        Expr::Seq(expr)
    }
}

/// An `|` alternation; arms are tried in source order
#[derive(Debug, PartialEq)]
pub struct AltExpr {
    pub arms: Vec<Expr>,
    pub span: Span,
}

impl From<AltExpr> for Expr {
    fn from(expr: AltExpr) -> Expr {
        Expr::Alt(expr)
    }
}

/// A `?` optional term
#[derive(Debug, PartialEq)]
pub struct OptExpr {
    pub expr: Box<Expr>,
    pub span: Span,
}

impl From<OptExpr> for Expr {
    fn from(expr: OptExpr) -> Expr {
        Expr::Opt(expr)
    }
}

/// A `*` or `+` repetition; occurrences chain through `edge`
#[derive(Debug, PartialEq)]
pub struct RepeatExpr {
    pub expr: Box<Expr>,
    pub edge: Edge,
    /// `+` when true, `*` when false.
    pub at_least_one: bool,
    pub span: Span,
}

impl From<RepeatExpr> for Expr {
    fn from(expr: RepeatExpr) -> Expr {
        Expr::Repeat(expr)
    }
}

/// A parenthesized group; forms a tuple boundary in the result shape
#[derive(Debug, PartialEq)]
pub struct GroupExpr {
    pub expr: Box<Expr>,
    pub span: Span,
}

impl From<GroupExpr> for Expr {
    fn from(expr: GroupExpr) -> Expr {
        Expr::Group(expr)
    }
}

/// A `[ … ]` extractor suffix; zero-width, records values from the last matched element
#[derive(Debug, PartialEq)]
pub struct ExtractExpr {
    pub expr: Box<Expr>,
    pub extractors: Vec<Extractor>,
    pub span: Span,
}

impl From<ExtractExpr> for Expr {
    fn from(expr: ExtractExpr) -> Expr {
        Expr::Extract(expr)
    }
}

/// A `~( … )` filter suffix; a boolean guard on the last matched element
#[derive(Debug, PartialEq)]
pub struct GuardExpr {
    pub expr: Box<Expr>,
    pub filter: FilterExpr,
    pub span: Span,
}

impl From<GuardExpr> for Expr {
    fn from(expr: GuardExpr) -> Expr {
        Expr::Guard(expr)
    }
}

/// A `{ … }` block: the head matches on the outer axis, the body on the opposite axis over the
/// head element's children
#[derive(Debug, PartialEq)]
pub struct SwitchExpr {
    /// `None` for a standalone block, which matches any element.
    pub head: Option<Box<Expr>>,
    pub body: Box<Expr>,
    pub outer_axis: Axis,
    pub span: Span,
}

impl From<SwitchExpr> for Expr {
    fn from(expr: SwitchExpr) -> Expr {
        Expr::Switch(expr)
    }
}

/// One extractor inside `[ … ]`
#[derive(Debug, PartialEq)]
pub struct Extractor {
    pub kind: ExtractorKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExtractorKind {
    /// `txt`: the element's text
    Text,
    /// `node`: a handle onto the element itself
    Node,
    /// `.name`: the value of an attribute
    Attr(String),
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExtractorKind::Text => f.write_str("txt"),
            ExtractorKind::Node => f.write_str("node"),
            ExtractorKind::Attr(name) => write!(f, ".{}", name),
        }
    }
}

/// A conjunction of tag tests, all of which must hold on the same element
#[derive(Debug, PartialEq)]
pub struct Selector {
    pub tests: Vec<TagTest>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum TagTest {
    /// `@`
    Any,
    /// a bare tag name
    Name(String),
    /// `.class`
    Class(String),
    /// `#id`
    Id(String),
    /// `!test`
    Not(Box<TagTest>),
    /// a parenthesized conjunction
    All(Vec<TagTest>),
}

impl fmt::Display for TagTest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TagTest::Any => f.write_str("@"),
            TagTest::Name(name) => f.write_str(name),
            TagTest::Class(class) => write!(f, ".{}", class),
            TagTest::Id(id) => write!(f, "#{}", id),
            TagTest::Not(test) => write!(f, "!{}", test),
            TagTest::All(tests) => {
                f.write_str("(")?;
                for test in tests {
                    test.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for test in &self.tests {
            test.fmt(f)?;
        }
        Ok(())
    }
}

/// A boolean guard expression inside `~( … )`
#[derive(Debug, PartialEq)]
pub enum FilterExpr {
    Or(Box<FilterExpr>, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Compare(CompareFilter),
    Matches(MatchesFilter),
    /// `.name`: truthy iff the attribute is present and non-empty
    Attr(String),
    /// `txt`: truthy iff the element's text is non-empty
    Text,
    /// `$name`: a caller-supplied filter function
    Call(String),
}

impl FilterExpr {
    fn calls<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            FilterExpr::Or(left, right) | FilterExpr::And(left, right) => {
                left.calls(refs);
                right.calls(refs);
            }
            FilterExpr::Call(name) => refs.push(name),
            FilterExpr::Compare(_)
            | FilterExpr::Matches(_)
            | FilterExpr::Attr(_)
            | FilterExpr::Text => {}
        }
    }
}

/// An `==` or `!=` comparison against a string literal
#[derive(Debug, PartialEq)]
pub struct CompareFilter {
    pub operand: Operand,
    /// `!=` when true.
    pub negated: bool,
    pub value: String,
}

impl From<CompareFilter> for FilterExpr {
    fn from(filter: CompareFilter) -> FilterExpr {
        FilterExpr::Compare(filter)
    }
}

/// A `~~` or `!~` regex test; the regex is compiled once, at pattern-compile time
#[derive(Debug)]
pub struct MatchesFilter {
    pub operand: Operand,
    /// `!~` when true.
    pub negated: bool,
    pub regex: Regex,
}

impl PartialEq for MatchesFilter {
    fn eq(&self, other: &MatchesFilter) -> bool {
        self.operand == other.operand
            && self.negated == other.negated
            && self.regex.as_str() == other.regex.as_str()
    }
}

impl From<MatchesFilter> for FilterExpr {
    fn from(filter: MatchesFilter) -> FilterExpr {
        FilterExpr::Matches(filter)
    }
}

/// The left-hand side of a comparison
#[derive(Debug, Eq, PartialEq)]
pub enum Operand {
    Attr(String),
    Text,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Attr(name) => write!(f, ".{}", name),
            Operand::Text => f.write_str("txt"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Canonical rendering
//
// `Display` emits a canonical source form that re-parses to the same AST; that round trip is what
// the compiler tests assert.

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Element(e) => e.selector.fmt(f),
            Expr::Boundary(_) => f.write_str("$"),
            Expr::Seq(e) => {
                e.children[0].fmt(f)?;
                for (edge, child) in e.edges.iter().zip(&e.children[1..]) {
                    write!(f, " {} {}", edge, child)?;
                }
                Ok(())
            }
            Expr::Alt(e) => {
                for (i, arm) in e.arms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    arm.fmt(f)?;
                }
                Ok(())
            }
            Expr::Opt(e) => write!(f, "{}?", e.expr),
            Expr::Repeat(e) => write!(
                f,
                "({} {}){}",
                e.expr,
                e.edge,
                if e.at_least_one { "+" } else { "*" }
            ),
            Expr::Group(e) => write!(f, "({})", e.expr),
            Expr::Extract(e) => {
                e.expr.fmt(f)?;
                f.write_str("[")?;
                for (i, extractor) in e.extractors.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    extractor.fmt(f)?;
                }
                f.write_str("]")
            }
            Expr::Guard(e) => write!(f, "{}~({})", e.expr, e.filter),
            Expr::Switch(e) => match &e.head {
                Some(head) => write!(f, "{} {{{}}}", head, e.body),
                None => write!(f, "{{{}}}", e.body),
            },
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

impl FilterExpr {
    /// `level` 0 admits `||`, 1 admits `&&`, 2 only atoms; anything lower-binding is
    /// parenthesized.
    fn fmt_prec(&self, f: &mut fmt::Formatter, level: u8) -> fmt::Result {
        match self {
            FilterExpr::Or(left, right) => {
                if level > 0 {
                    f.write_str("(")?;
                }
                left.fmt_prec(f, 0)?;
                f.write_str(" || ")?;
                right.fmt_prec(f, 1)?;
                if level > 0 {
                    f.write_str(")")?;
                }
                Ok(())
            }
            FilterExpr::And(left, right) => {
                if level > 1 {
                    f.write_str("(")?;
                }
                left.fmt_prec(f, 1)?;
                f.write_str(" && ")?;
                right.fmt_prec(f, 2)?;
                if level > 1 {
                    f.write_str(")")?;
                }
                Ok(())
            }
            FilterExpr::Compare(c) => write!(
                f,
                "{} {} '{}'",
                c.operand,
                if c.negated { "!=" } else { "==" },
                escape_literal(&c.value)
            ),
            FilterExpr::Matches(m) => write!(
                f,
                "{} {} '{}'",
                m.operand,
                if m.negated { "!~" } else { "~~" },
                escape_literal(m.regex.as_str())
            ),
            FilterExpr::Attr(name) => write!(f, ".{}", name),
            FilterExpr::Text => f.write_str("txt"),
            FilterExpr::Call(name) => write!(f, "${}", name),
        }
    }
}
