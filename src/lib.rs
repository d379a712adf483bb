// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! This library defines TQL, a small query language for HTML-like trees, and the engine that
//! matches compiled queries against them.
//!
//! # Overview
//!
//! A TQL query combines CSS-selector-style element predicates (tag, class, id) with
//! regular-expression-style combinators — alternation, optional, repetition, grouping — and two
//! orthogonal traversal axes: *depth* (parent to child, `>` and `>>`) and *breadth* (sibling to
//! sibling, `:` and `::`, written inside `{ … }`).  Elements can be decorated with extractors
//! (`[txt, node, .attr]`), which record values into the result, and with filters
//! (`~(.attr == 'v' && $fn)`), which guard the element with attribute comparisons, regex tests,
//! and caller-supplied functions.
//!
//! [`compile`] turns a query string into an immutable [`Pattern`] whose result shape is fixed at
//! compile time; [`Pattern::matches`] lazily enumerates every match in a tree, yielding one
//! shaped tuple per match.  Trees are supplied through the [`tree::TreeNode`] adapter trait, so
//! any DOM library can be plugged in; parsing HTML is out of this crate's scope.
//!
//! ```
//! use tql::tree::{Document, Element};
//! use tql::{compile, Filters, Value};
//!
//! let doc = Document::build(
//!     Element::new("div")
//!         .id("find-me")
//!         .attr("data-attr", "world")
//!         .text("hello"),
//! );
//! let pattern = compile("div#find-me[txt, .data-attr]").unwrap();
//! let results: Vec<_> = pattern
//!     .matches(doc.root(), &Filters::new())
//!     .unwrap()
//!     .collect();
//! assert_eq!(
//!     results,
//!     vec![Value::Tuple(vec![
//!         Value::Str("hello".into()),
//!         Value::Str("world".into()),
//!     ])],
//! );
//! ```

use std::fmt;

use thiserror::Error;

#[cfg(feature = "term-colors")]
use colored::Colorize;

pub mod ast;
pub mod filters;
pub mod matcher;
pub mod parser;
pub mod shape;
pub mod tokenizer;
pub mod tree;

pub use ast::Pattern;
pub use filters::Filters;
pub use matcher::MatchError;
pub use matcher::Matches;
pub use matcher::Value;
pub use parser::ParseError;
pub use shape::Shape;
pub use shape::ShapeError;
pub use tokenizer::LexError;
pub use tokenizer::Span;
pub use tree::TreeNode;

/// An error that can occur while compiling a query
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl CompileError {
    /// The byte range of the query source this error points at.
    pub fn span(&self) -> Span {
        match self {
            CompileError::Lex(e) => e.span(),
            CompileError::Parse(e) => e.span(),
            CompileError::Shape(e) => e.span(),
        }
    }

    /// Renders the error with the offending source line and a caret underline.
    pub fn display_pretty<'a>(&'a self, source: &'a str) -> impl fmt::Display + 'a {
        CompileErrorDisplay {
            error: self,
            source,
        }
    }
}

struct CompileErrorDisplay<'a> {
    error: &'a CompileError,
    source: &'a str,
}

impl fmt::Display for CompileErrorDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.error)?;
        let span = self.error.span();
        let start = span.start.min(self.source.len());
        let line_start = self.source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = self.source[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(self.source.len());
        let line = &self.source[line_start..line_end];
        let column = start - line_start;
        let width = span.end.min(line_end).saturating_sub(start).max(1);
        let carets = "^".repeat(width);
        #[cfg(feature = "term-colors")]
        let carets = carets.red().to_string();
        writeln!(f, "| {}", line)?;
        write!(f, "  {}{}", " ".repeat(column), carets)
    }
}

/// Compiles a query into a reusable [`Pattern`].
///
/// Compilation is deterministic; the same source always produces the same pattern, and the
/// pattern's result shape is derived here, before any tree is seen.
pub fn compile(source: &str) -> Result<Pattern, CompileError> {
    let tokens = tokenizer::tokenize(source)?;
    let expr = parser::parse(tokens, source.len())?;
    let shape = shape::analyze(&expr)?;
    Ok(Pattern { expr, shape })
}
