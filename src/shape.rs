// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Derives the static result shape of a pattern.
//!
//! The shape is computed once, at compile time, from the pattern alone; the matcher only ever
//! fills slots.  This is what lets alternation arms with mismatched shapes be rejected before any
//! tree is seen.

use std::fmt;
use std::fmt::Display;

use thiserror::Error;

use crate::ast::Expr;
use crate::tokenizer::Span;

/// The static structure of every result a pattern produces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Shape {
    /// One extractor: a string or a node handle.
    Scalar,
    /// A fixed-arity tuple, from a group or the top level.
    Tuple(Vec<Shape>),
    /// An ordered sequence, from `*` or `+`.
    List(Box<Shape>),
    /// An inner result or the absent sentinel, from `?`.
    Optional(Box<Shape>),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Shape::Scalar => f.write_str("_"),
            Shape::Tuple(children) => {
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    child.fmt(f)?;
                }
                f.write_str(")")
            }
            Shape::List(inner) => write!(f, "[{}]", inner),
            Shape::Optional(inner) => write!(f, "{}?", inner),
        }
    }
}

/// An error that can occur while deriving a pattern's shape
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("Alternation arms have mismatched shapes at {0}")]
    AltArms(Span),
}

impl ShapeError {
    pub fn span(&self) -> Span {
        match self {
            ShapeError::AltArms(span) => *span,
        }
    }
}

/// Derives the shape of a pattern.  The top level is always a tuple, never collapsed, so a
/// pattern without extractors yields empty tuples.
pub fn analyze(expr: &Expr) -> Result<Shape, ShapeError> {
    Ok(Shape::Tuple(contributions(expr)?))
}

/// One slot per extractor reachable from `expr` without crossing a group, repetition, or
/// optional boundary, in source order.
fn contributions(expr: &Expr) -> Result<Vec<Shape>, ShapeError> {
    match expr {
        Expr::Element(_) | Expr::Boundary(_) => Ok(Vec::new()),
        Expr::Seq(e) => {
            let mut slots = Vec::new();
            for child in &e.children {
                slots.extend(contributions(child)?);
            }
            Ok(slots)
        }
        Expr::Alt(e) => {
            let mut arms = e.arms.iter();
            let first = match arms.next() {
                Some(arm) => contributions(arm)?,
                None => return Ok(Vec::new()),
            };
            for arm in arms {
                if contributions(arm)? != first {
                    return Err(ShapeError::AltArms(e.span));
                }
            }
            Ok(first)
        }
        Expr::Opt(e) => {
            let inner = contributions(&e.expr)?;
            if inner.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![Shape::Optional(Box::new(collapse(inner)))])
            }
        }
        Expr::Repeat(e) => {
            let inner = contributions(&e.expr)?;
            if inner.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![Shape::List(Box::new(collapse(inner)))])
            }
        }
        Expr::Group(e) => {
            let inner = contributions(&e.expr)?;
            // An arity-1 group passes its single slot through, so `(a[txt])*` is a list of
            // scalars rather than a list of 1-tuples.
            if inner.len() > 1 {
                Ok(vec![Shape::Tuple(inner)])
            } else {
                Ok(inner)
            }
        }
        Expr::Extract(e) => {
            let mut slots = contributions(&e.expr)?;
            slots.extend(e.extractors.iter().map(|_| Shape::Scalar));
            Ok(slots)
        }
        Expr::Guard(e) => contributions(&e.expr),
        Expr::Switch(e) => {
            let mut slots = match &e.head {
                Some(head) => contributions(head)?,
                None => Vec::new(),
            };
            slots.extend(contributions(&e.body)?);
            Ok(slots)
        }
    }
}

/// A single-slot occurrence stays a scalar-like value; several slots form a tuple.
fn collapse(mut slots: Vec<Shape>) -> Shape {
    if slots.len() == 1 {
        slots.pop().unwrap()
    } else {
        Shape::Tuple(slots)
    }
}
