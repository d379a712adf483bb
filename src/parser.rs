// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Parses a token stream into a pattern expression.
//!
//! Recursive descent, one method per construct.  The current traversal axis is tracked on an
//! explicit stack: `{` pushes the opposite axis, `}` pops it, so the matcher never has to look at
//! braces.  Filter regex literals are compiled here, once per query.

use regex::Regex;
use thiserror::Error;

use crate::ast;
use crate::ast::Axis;
use crate::ast::Edge;
use crate::ast::Expr;
use crate::ast::Operand;
use crate::tokenizer::Span;
use crate::tokenizer::Token;
use crate::tokenizer::TokenKind;

/// An error that can occur while parsing a query
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Expected {0} at {1}")]
    ExpectedToken(&'static str, Span),
    #[error("Unexpected '{0}' in {1} at {2}")]
    UnexpectedToken(String, &'static str, Span),
    #[error("Unexpected end of query at {0}")]
    UnexpectedEof(Span),
    #[error("Invalid regular expression /{0}/ at {1}")]
    InvalidRegex(String, Span),
    #[error("'{0}' cannot be used on the {1} axis at {2}")]
    MismatchedAxis(Edge, Axis, Span),
    #[error("Invalid extractor '{0}' at {1}")]
    InvalidExtractor(String, Span),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::ExpectedToken(_, span) => *span,
            ParseError::UnexpectedToken(_, _, span) => *span,
            ParseError::UnexpectedEof(span) => *span,
            ParseError::InvalidRegex(_, span) => *span,
            ParseError::MismatchedAxis(_, _, span) => *span,
            ParseError::InvalidExtractor(_, span) => *span,
        }
    }
}

/// Parses a complete query.  `end` is the byte length of the source, used to span EOF errors.
pub(crate) fn parse(tokens: Vec<Token>, end: usize) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokens, end);
    let expr = parser.parse_alt()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::UnexpectedToken(
            token.kind.spelling().into(),
            "query",
            token.span,
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    axes: Vec<Axis>,
}

impl Parser {
    fn new(tokens: Vec<Token>, end: usize) -> Parser {
        Parser {
            tokens,
            pos: 0,
            end,
            axes: vec![Axis::Depth],
        }
    }

    fn axis(&self) -> Axis {
        *self.axes.last().unwrap()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn peek2_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|token| &token.kind)
    }

    /// The span of the next token, or an empty span at the end of the query.
    fn here(&self) -> Span {
        self.peek()
            .map(|token| token.span)
            .unwrap_or_else(|| Span::new(self.end, self.end))
    }

    /// The span of the most recently consumed token.
    fn behind(&self) -> Span {
        self.tokens
            .get(self.pos.wrapping_sub(1))
            .map(|token| token.span)
            .unwrap_or_default()
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ParseError::UnexpectedEof(Span::new(self.end, self.end)))?;
        self.pos += 1;
        Ok(token)
    }

    /// Consumes the next token if it has the given kind.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(&kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, spelling: &'static str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ParseError::ExpectedToken(spelling, self.here()))
        }
    }

    fn expect_ident(&mut self, within: &'static str) -> Result<String, ParseError> {
        let span = self.here();
        match self.next()?.kind {
            TokenKind::Ident(name) => Ok(name),
            kind => Err(ParseError::UnexpectedToken(
                kind.spelling().into(),
                within,
                span,
            )),
        }
    }

    fn expect_string(&mut self, within: &'static str) -> Result<String, ParseError> {
        let span = self.here();
        match self.next()?.kind {
            TokenKind::Str(value) => Ok(value),
            kind => Err(ParseError::UnexpectedToken(
                kind.spelling().into(),
                within,
                span,
            )),
        }
    }

    /// The edge the next token denotes, if it is a traversal sigil.
    fn peek_edge(&self) -> Option<Edge> {
        match self.peek_kind()? {
            TokenKind::Gt => Some(Edge::Direct),
            TokenKind::GtGt => Some(Edge::Descendant),
            TokenKind::Colon => Some(Edge::Adjacent),
            TokenKind::ColonColon => Some(Edge::Following),
            _ => None,
        }
    }

    fn take_edge(&mut self) -> Result<Edge, ParseError> {
        let edge = self.peek_edge().unwrap();
        let span = self.here();
        self.pos += 1;
        if edge.axis() != self.axis() {
            return Err(ParseError::MismatchedAxis(edge, self.axis(), span));
        }
        Ok(edge)
    }

    fn parse_alt(&mut self) -> Result<Expr, ParseError> {
        let start = self.here();
        let mut arms = vec![self.parse_seq()?];
        while self.eat(TokenKind::Bar) {
            arms.push(self.parse_seq()?);
        }
        if arms.len() == 1 {
            Ok(arms.pop().unwrap())
        } else {
            let span = start.to(self.behind());
            Ok(ast::AltExpr { arms, span }.into())
        }
    }

    fn parse_seq(&mut self) -> Result<Expr, ParseError> {
        let start = self.here();
        let mut children = vec![self.parse_term()?];
        let mut edges = Vec::new();
        while let Some(edge) = self.peek_edge() {
            // A trailing edge just before `)` belongs to the enclosing repetition group.
            if self.peek2_kind() == Some(&TokenKind::RParen) {
                break;
            }
            edges.push(self.take_edge()?);
            children.push(self.parse_term()?);
        }
        if children.len() == 1 {
            Ok(children.pop().unwrap())
        } else {
            let span = start.to(self.behind());
            Ok(ast::SeqExpr {
                axis: self.axis(),
                children,
                edges,
                span,
            }
            .into())
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let start = self.here();
        let mut expr = self.parse_atom()?;
        loop {
            expr = match self.peek_kind() {
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    let extractors = self.parse_extractors()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    ast::ExtractExpr {
                        expr: Box::new(expr),
                        extractors,
                        span: start.to(self.behind()),
                    }
                    .into()
                }
                Some(TokenKind::Tilde) => {
                    self.pos += 1;
                    self.expect(TokenKind::LParen, "'('")?;
                    let filter = self.parse_filter_or()?;
                    self.expect(TokenKind::RParen, "')'")?;
                    ast::GuardExpr {
                        expr: Box::new(expr),
                        filter,
                        span: start.to(self.behind()),
                    }
                    .into()
                }
                Some(TokenKind::LBrace) => {
                    let body = self.parse_switch_body()?;
                    ast::SwitchExpr {
                        head: Some(Box::new(expr)),
                        body: Box::new(body),
                        outer_axis: self.axis(),
                        span: start.to(self.behind()),
                    }
                    .into()
                }
                Some(TokenKind::Question) => {
                    self.pos += 1;
                    ast::OptExpr {
                        expr: Box::new(expr),
                        span: start.to(self.behind()),
                    }
                    .into()
                }
                Some(TokenKind::Star) | Some(TokenKind::Plus) => {
                    let at_least_one = self.peek_kind() == Some(&TokenKind::Plus);
                    self.pos += 1;
                    ast::RepeatExpr {
                        expr: Box::new(expr),
                        edge: self.axis().direct_edge(),
                        at_least_one,
                        span: start.to(self.behind()),
                    }
                    .into()
                }
                _ => return Ok(expr),
            };
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let start = self.here();
        match self.peek_kind() {
            Some(TokenKind::Dollar) => {
                self.pos += 1;
                Ok(ast::BoundaryExpr {
                    axis: self.axis(),
                    span: start,
                }
                .into())
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let expr = self.parse_alt()?;
                // `( seq edge )` followed by a quantifier is a repetition with an explicit
                // chaining edge; a plain `)` closes an ordinary group.
                if self.peek_edge().is_some() {
                    let edge = self.take_edge()?;
                    self.expect(TokenKind::RParen, "')'")?;
                    let at_least_one = match self.peek_kind() {
                        Some(TokenKind::Star) => false,
                        Some(TokenKind::Plus) => true,
                        _ => return Err(ParseError::ExpectedToken("'*' or '+'", self.here())),
                    };
                    self.pos += 1;
                    Ok(ast::RepeatExpr {
                        expr: Box::new(expr),
                        edge,
                        at_least_one,
                        span: start.to(self.behind()),
                    }
                    .into())
                } else {
                    self.expect(TokenKind::RParen, "')'")?;
                    Ok(ast::GroupExpr {
                        expr: Box::new(expr),
                        span: start.to(self.behind()),
                    }
                    .into())
                }
            }
            Some(TokenKind::LBrace) => {
                let body = self.parse_switch_body()?;
                Ok(ast::SwitchExpr {
                    head: None,
                    body: Box::new(body),
                    outer_axis: self.axis(),
                    span: start.to(self.behind()),
                }
                .into())
            }
            Some(TokenKind::At)
            | Some(TokenKind::Ident(_))
            | Some(TokenKind::Dot)
            | Some(TokenKind::Hash)
            | Some(TokenKind::Bang) => {
                let selector = self.parse_selector()?;
                Ok(ast::ElementExpr {
                    selector,
                    axis: self.axis(),
                    span: start.to(self.behind()),
                }
                .into())
            }
            Some(kind) => Err(ParseError::UnexpectedToken(
                kind.spelling().into(),
                "pattern",
                start,
            )),
            None => Err(ParseError::UnexpectedEof(start)),
        }
    }

    fn parse_switch_body(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        self.axes.push(self.axis().opposite());
        let body = self.parse_alt()?;
        self.axes.pop();
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    fn parse_selector(&mut self) -> Result<ast::Selector, ParseError> {
        let start = self.here();
        let mut tests = vec![self.parse_tag_test()?];
        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) | Some(TokenKind::Hash) | Some(TokenKind::Bang) => {
                    tests.push(self.parse_tag_test()?);
                }
                _ => break,
            }
        }
        Ok(ast::Selector {
            tests,
            span: start.to(self.behind()),
        })
    }

    fn parse_tag_test(&mut self) -> Result<ast::TagTest, ParseError> {
        let span = self.here();
        match self.next()?.kind {
            TokenKind::At => Ok(ast::TagTest::Any),
            TokenKind::Ident(name) => Ok(ast::TagTest::Name(name)),
            TokenKind::Dot => Ok(ast::TagTest::Class(self.expect_ident("class name")?)),
            TokenKind::Hash => Ok(ast::TagTest::Id(self.expect_ident("id")?)),
            TokenKind::Bang => Ok(ast::TagTest::Not(Box::new(self.parse_tag_test()?))),
            TokenKind::LParen => {
                let mut tests = vec![self.parse_tag_test()?];
                while self.peek_kind() != Some(&TokenKind::RParen) {
                    tests.push(self.parse_tag_test()?);
                }
                self.expect(TokenKind::RParen, "')'")?;
                Ok(ast::TagTest::All(tests))
            }
            kind => Err(ParseError::UnexpectedToken(
                kind.spelling().into(),
                "selector",
                span,
            )),
        }
    }

    fn parse_extractors(&mut self) -> Result<Vec<ast::Extractor>, ParseError> {
        let mut extractors = vec![self.parse_extractor()?];
        while self.eat(TokenKind::Comma) {
            extractors.push(self.parse_extractor()?);
        }
        Ok(extractors)
    }

    fn parse_extractor(&mut self) -> Result<ast::Extractor, ParseError> {
        let span = self.here();
        match self.next()?.kind {
            TokenKind::Ident(name) if name == "txt" => Ok(ast::Extractor {
                kind: ast::ExtractorKind::Text,
                span,
            }),
            TokenKind::Ident(name) if name == "node" => Ok(ast::Extractor {
                kind: ast::ExtractorKind::Node,
                span,
            }),
            TokenKind::Ident(name) => Err(ParseError::InvalidExtractor(name, span)),
            TokenKind::Dot => {
                let name = self.expect_ident("attribute name")?;
                Ok(ast::Extractor {
                    kind: ast::ExtractorKind::Attr(name),
                    span: span.to(self.behind()),
                })
            }
            kind => Err(ParseError::UnexpectedToken(
                kind.spelling().into(),
                "extractor",
                span,
            )),
        }
    }

    // Filters: `||` is lowest, then `&&`, then comparisons against string literals.

    fn parse_filter_or(&mut self) -> Result<ast::FilterExpr, ParseError> {
        let mut filter = self.parse_filter_and()?;
        while self.eat(TokenKind::BarBar) {
            let right = self.parse_filter_and()?;
            filter = ast::FilterExpr::Or(Box::new(filter), Box::new(right));
        }
        Ok(filter)
    }

    fn parse_filter_and(&mut self) -> Result<ast::FilterExpr, ParseError> {
        let mut filter = self.parse_filter_cmp()?;
        while self.eat(TokenKind::AmpAmp) {
            let right = self.parse_filter_cmp()?;
            filter = ast::FilterExpr::And(Box::new(filter), Box::new(right));
        }
        Ok(filter)
    }

    fn parse_filter_cmp(&mut self) -> Result<ast::FilterExpr, ParseError> {
        let span = self.here();
        let operand = match self.peek_kind() {
            Some(TokenKind::Dot) => {
                self.pos += 1;
                Operand::Attr(self.expect_ident("attribute name")?)
            }
            Some(TokenKind::Ident(name)) if name.as_str() == "txt" => {
                self.pos += 1;
                Operand::Text
            }
            Some(TokenKind::Dollar) => {
                self.pos += 1;
                let name = self.expect_ident("filter function name")?;
                return Ok(ast::FilterExpr::Call(name));
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let inner = self.parse_filter_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            Some(kind) => {
                return Err(ParseError::UnexpectedToken(
                    kind.spelling().into(),
                    "filter",
                    span,
                ))
            }
            None => return Err(ParseError::UnexpectedEof(span)),
        };
        match self.peek_kind() {
            Some(TokenKind::EqEq) | Some(TokenKind::BangEq) => {
                let negated = self.peek_kind() == Some(&TokenKind::BangEq);
                self.pos += 1;
                let value = self.expect_string("comparison")?;
                Ok(ast::CompareFilter {
                    operand,
                    negated,
                    value,
                }
                .into())
            }
            Some(TokenKind::TildeTilde) | Some(TokenKind::BangTilde) => {
                let negated = self.peek_kind() == Some(&TokenKind::BangTilde);
                self.pos += 1;
                let pattern_span = self.here();
                let pattern = self.expect_string("regex comparison")?;
                let regex = Regex::new(&pattern)
                    .map_err(|_| ParseError::InvalidRegex(pattern.clone(), pattern_span))?;
                Ok(ast::MatchesFilter {
                    operand,
                    negated,
                    regex,
                }
                .into())
            }
            _ => Ok(match operand {
                Operand::Attr(name) => ast::FilterExpr::Attr(name),
                Operand::Text => ast::FilterExpr::Text,
            }),
        }
    }
}
