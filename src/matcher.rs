// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The backtracking engine that applies a compiled pattern to a tree.
//!
//! Every AST node evaluates to a lazy stream of match states; combinators chain the streams, so
//! backtracking is just "keep pulling".  A state is a cursor: the element last matched (`at`),
//! the candidate the next term will be tried against (`ahead`), which side of a sequence we are
//! on (consulted only by `$`), and the stack of partially built capture frames.  Frames are
//! pushed and popped exactly where the shape analyzer placed its boundaries, so every emitted
//! result conforms to the pattern's precomputed shape.
//!
//! Enumeration is lazy: nothing is matched until the caller pulls, and dropping the iterator
//! cancels the rest of the search.  Results are not deduplicated; distinct choice points that
//! produce equal tuples yield equal tuples.

use log::trace;
use smallvec::SmallVec;
use thiserror::Error;

use crate::ast;
use crate::ast::Axis;
use crate::ast::Edge;
use crate::ast::Expr;
use crate::ast::FilterExpr;
use crate::ast::Operand;
use crate::ast::Pattern;
use crate::ast::Selector;
use crate::ast::TagTest;
use crate::filters::Filters;
use crate::tree::descendants;
use crate::tree::following_siblings;
use crate::tree::is_first_child;
use crate::tree::next_sibling;
use crate::tree::TreeNode;

/// An error that prevents enumeration from starting
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Unknown filter function '{0}'")]
    UnknownFilter(String),
}

/// One shaped result value.
///
/// The top level of every result is a `Tuple`.  `Node` handles stay valid for as long as the
/// caller keeps the underlying tree alive.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<N> {
    Str(String),
    Node(N),
    Tuple(Vec<Value<N>>),
    List(Vec<Value<N>>),
    /// The sentinel for a `?` whose body did not match.
    Absent,
}

impl Pattern {
    /// Lazily enumerates every match of this pattern within the tree rooted at `root`.
    ///
    /// The pattern is tried at `root` and at every descendant, in document order; a pattern whose
    /// first term is `$` is tried at the root only.  All `$name` references in the query are
    /// resolved against `filters` before enumeration begins.
    pub fn matches<'p, 't: 'p, 'f: 'p, N>(
        &'p self,
        root: N,
        filters: &'p Filters<'f, N>,
    ) -> Result<Matches<'p, N>, MatchError>
    where
        N: TreeNode<'t> + 'p,
    {
        let mut refs = Vec::new();
        self.expr.filter_refs(&mut refs);
        for name in refs {
            if !filters.contains(name) {
                return Err(MatchError::UnknownFilter(name.to_string()));
            }
        }

        let cx = Cx { filters, root };
        let expr = &self.expr;
        let candidates: Box<dyn Iterator<Item = N> + 'p> = if expr.is_anchored() {
            trace!("matching `{}` anchored at the root", self);
            Box::new(std::iter::once(root))
        } else {
            trace!("matching `{}` at every element", self);
            Box::new(std::iter::once(root).chain(descendants(root)))
        };
        let results = candidates.flat_map(move |candidate| {
            trace!("rooting at {:?}", candidate);
            eval(expr, MatchState::start(candidate), cx).map(MatchState::finish)
        });
        Ok(Matches {
            results: Box::new(results),
        })
    }
}

/// The lazy stream of results of one `matches` call.
pub struct Matches<'p, N> {
    results: Box<dyn Iterator<Item = Value<N>> + 'p>,
}

impl<'p, N> Iterator for Matches<'p, N> {
    type Item = Value<N>;

    fn next(&mut self) -> Option<Value<N>> {
        self.results.next()
    }
}

// ------------------------------------------------------------------------------------------------
// Cursor state

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Side {
    Left,
    Right,
}

type Frame<N> = SmallVec<[Value<N>; 4]>;

#[derive(Clone)]
struct MatchState<N> {
    at: Option<N>,
    ahead: Option<N>,
    side: Side,
    frames: Vec<Frame<N>>,
}

impl<N: Copy> MatchState<N> {
    fn start(candidate: N) -> MatchState<N> {
        MatchState {
            at: None,
            ahead: Some(candidate),
            side: Side::Left,
            frames: vec![SmallVec::new()],
        }
    }

    fn matched(mut self, at: N, ahead: Option<N>) -> MatchState<N> {
        self.at = Some(at);
        self.ahead = ahead;
        self
    }

    fn moved(mut self, ahead: Option<N>) -> MatchState<N> {
        self.ahead = ahead;
        self
    }

    fn with_side(mut self, side: Side) -> MatchState<N> {
        self.side = side;
        self
    }

    fn push_frame(mut self) -> MatchState<N> {
        self.frames.push(SmallVec::new());
        self
    }

    /// Pops the top frame and appends it to the new top as a single value: the lone value for an
    /// arity-1 frame, a tuple otherwise.
    fn pop_collapse(mut self) -> MatchState<N> {
        let frame = self.frames.pop().unwrap();
        let value = if frame.len() == 1 {
            frame.into_iter().next().unwrap()
        } else {
            Value::Tuple(frame.into_vec())
        };
        self.frames.last_mut().unwrap().push(value);
        self
    }

    /// Pops the top frame and appends it to the new top as a list.
    fn pop_list(mut self) -> MatchState<N> {
        let frame = self.frames.pop().unwrap();
        self.frames
            .last_mut()
            .unwrap()
            .push(Value::List(frame.into_vec()));
        self
    }

    fn push_value(mut self, value: Value<N>) -> MatchState<N> {
        self.frames.last_mut().unwrap().push(value);
        self
    }

    fn finish(mut self) -> Value<N> {
        let frame = self.frames.pop().unwrap();
        Value::Tuple(frame.into_vec())
    }
}

struct Cx<'e, 'f, N> {
    filters: &'e Filters<'f, N>,
    root: N,
}

impl<'e, 'f, N: Copy> Clone for Cx<'e, 'f, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'e, 'f, N: Copy> Copy for Cx<'e, 'f, N> {}

type StateIter<'e, N> = Box<dyn Iterator<Item = MatchState<N>> + 'e>;

fn none<'e, N: 'e>() -> StateIter<'e, N> {
    Box::new(std::iter::empty())
}

fn one<'e, N: 'e>(state: MatchState<N>) -> StateIter<'e, N> {
    Box::new(std::iter::once(state))
}

// ------------------------------------------------------------------------------------------------
// Evaluation

fn eval<'e, 't: 'e, 'f: 'e, N>(
    expr: &'e Expr,
    state: MatchState<N>,
    cx: Cx<'e, 'f, N>,
) -> StateIter<'e, N>
where
    N: TreeNode<'t> + 'e,
{
    match expr {
        Expr::Element(el) => {
            let node = match state.ahead {
                Some(node) => node,
                None => return none(),
            };
            if !select(&el.selector, node) {
                return none();
            }
            advance_from(node, el.axis, state)
        }

        Expr::Boundary(b) => {
            let holds = match (state.side, state.ahead) {
                (_, None) => true,
                (Side::Left, Some(node)) => match b.axis {
                    Axis::Depth => node == cx.root,
                    Axis::Breadth => is_first_child(node),
                },
                (Side::Right, Some(_)) => false,
            };
            if holds {
                one(state)
            } else {
                none()
            }
        }

        Expr::Seq(seq) => {
            let mut states = eval(&seq.children[0], state.with_side(Side::Left), cx);
            for (child, edge) in seq.children[1..].iter().zip(seq.edges.iter().copied()) {
                states = Box::new(states.flat_map(move |s| {
                    let targets = edge_targets(edge, s.ahead);
                    let base = s.with_side(Side::Right);
                    targets.flat_map(move |target| eval(child, base.clone().moved(target), cx))
                }));
            }
            states
        }

        Expr::Alt(alt) => Box::new(
            alt.arms
                .iter()
                .flat_map(move |arm| eval(arm, state.clone(), cx)),
        ),

        Expr::Opt(opt) => {
            // The body is tried first; the zero-width skip is the backtrack alternative.
            if opt.expr.has_extractors() {
                let matched =
                    eval(&opt.expr, state.clone().push_frame(), cx).map(MatchState::pop_collapse);
                Box::new(matched.chain(std::iter::once(state.push_value(Value::Absent))))
            } else {
                Box::new(eval(&opt.expr, state.clone(), cx).chain(std::iter::once(state)))
            }
        }

        Expr::Repeat(rep) => {
            let shaped = rep.expr.has_extractors();
            let base = if shaped { state.push_frame() } else { state };
            let occurrences = repeat_from(rep, base.clone(), Vec::new(), shaped, cx);
            if rep.at_least_one {
                occurrences
            } else {
                // Greedy: the empty repetition is the last resort.
                Box::new(occurrences.chain(std::iter::once(close_repeat(base, shaped))))
            }
        }

        Expr::Group(group) => {
            if group.expr.has_extractors() {
                Box::new(eval(&group.expr, state.push_frame(), cx).map(MatchState::pop_collapse))
            } else {
                eval(&group.expr, state, cx)
            }
        }

        Expr::Extract(ex) => Box::new(eval(&ex.expr, state, cx).filter_map(move |s| {
            let node = s.at?;
            let mut s = s;
            for extractor in &ex.extractors {
                s = s.push_value(extract(extractor, node));
            }
            Some(s)
        })),

        Expr::Guard(guard) => Box::new(eval(&guard.expr, state, cx).filter(move |s| {
            s.at
                .map_or(false, |node| eval_filter(&guard.filter, node, cx))
        })),

        Expr::Switch(sw) => {
            let heads = match &sw.head {
                Some(head) => eval(head, state, cx),
                None => match state.ahead {
                    Some(node) => advance_from(node, sw.outer_axis, state),
                    None => none(),
                },
            };
            match sw.outer_axis {
                // Depth: the head fanned out over its children; the breadth body walks them.
                Axis::Depth => Box::new(heads.flat_map(move |s| eval(&sw.body, s, cx))),
                // Breadth: the depth body re-enters the head element itself, and the outer
                // sibling cursor is restored once the block is done.
                Axis::Breadth => Box::new(heads.flat_map(move |s| {
                    let node = match s.at {
                        Some(node) => node,
                        None => return none(),
                    };
                    let resume = s.ahead;
                    let body: StateIter<'e, N> = Box::new(
                        eval(&sw.body, s.moved(Some(node)), cx).map(move |t| t.moved(resume)),
                    );
                    body
                })),
            }
        }
    }
}

/// Fans a freshly matched element out into the follow-up states of its axis: one state per child
/// on the depth axis (or a single exhausted state for a leaf), the next sibling on breadth.
fn advance_from<'e, 't: 'e, N>(node: N, axis: Axis, state: MatchState<N>) -> StateIter<'e, N>
where
    N: TreeNode<'t> + 'e,
{
    match axis {
        Axis::Depth => {
            let children: Vec<N> = node.children().collect();
            if children.is_empty() {
                one(state.matched(node, None))
            } else {
                Box::new(
                    children
                        .into_iter()
                        .map(move |child| state.clone().matched(node, Some(child))),
                )
            }
        }
        Axis::Breadth => one(state.matched(node, next_sibling(node))),
    }
}

/// The candidates an edge offers to the following term.
fn edge_targets<'e, 't: 'e, N>(edge: Edge, ahead: Option<N>) -> Box<dyn Iterator<Item = Option<N>> + 'e>
where
    N: TreeNode<'t> + 'e,
{
    match (edge, ahead) {
        (Edge::Direct, ahead) | (Edge::Adjacent, ahead) => Box::new(std::iter::once(ahead)),
        (Edge::Descendant, Some(node)) => Box::new(
            std::iter::once(Some(node)).chain(descendants(node).map(Some)),
        ),
        (Edge::Following, Some(node)) => Box::new(
            std::iter::once(Some(node)).chain(following_siblings(node).map(Some)),
        ),
        (Edge::Descendant, None) | (Edge::Following, None) => Box::new(std::iter::once(None)),
    }
}

/// One round of a repetition: try the body here, then chain deeper occurrences through the
/// repetition's edge before conceding the exit.  `visited` holds the cursor positions already
/// expanded along this chain; re-entering one means the body matched nothing, which would loop.
fn repeat_from<'e, 't: 'e, 'f: 'e, N>(
    rep: &'e ast::RepeatExpr,
    state: MatchState<N>,
    visited: Vec<(Option<N>, Option<N>)>,
    shaped: bool,
    cx: Cx<'e, 'f, N>,
) -> StateIter<'e, N>
where
    N: TreeNode<'t> + 'e,
{
    let cursor = (state.at, state.ahead);
    if visited.contains(&cursor) {
        return none();
    }
    let mut visited = visited;
    visited.push(cursor);

    let occurrence = if shaped { state.push_frame() } else { state };
    Box::new(eval(&rep.expr, occurrence, cx).flat_map(move |s| {
        let s = if shaped { s.pop_collapse() } else { s };
        let exit = close_repeat(s.clone(), shaped);
        let targets = edge_targets(rep.edge, s.ahead);
        let visited = visited.clone();
        targets
            .flat_map(move |target| {
                repeat_from(rep, s.clone().moved(target), visited.clone(), shaped, cx)
            })
            .chain(std::iter::once(exit))
    }))
}

fn close_repeat<N: Copy>(state: MatchState<N>, shaped: bool) -> MatchState<N> {
    if shaped {
        state.pop_list()
    } else {
        state
    }
}

// ------------------------------------------------------------------------------------------------
// Element predicates, extractors, and filters

fn select<'t, N: TreeNode<'t>>(selector: &Selector, node: N) -> bool {
    selector.tests.iter().all(|test| tag_test(test, node))
}

fn tag_test<'t, N: TreeNode<'t>>(test: &TagTest, node: N) -> bool {
    match test {
        TagTest::Any => true,
        TagTest::Name(name) => node.tag_name() == name,
        TagTest::Class(class) => node.classes().any(|c| c == class),
        TagTest::Id(id) => node.id() == Some(id.as_str()),
        TagTest::Not(test) => !tag_test(test, node),
        TagTest::All(tests) => tests.iter().all(|test| tag_test(test, node)),
    }
}

fn extract<'t, N: TreeNode<'t>>(extractor: &ast::Extractor, node: N) -> Value<N> {
    match &extractor.kind {
        ast::ExtractorKind::Text => Value::Str(node.text()),
        ast::ExtractorKind::Node => Value::Node(node),
        ast::ExtractorKind::Attr(name) => {
            Value::Str(node.attr(name).unwrap_or_default().to_string())
        }
    }
}

fn eval_filter<'t, N: TreeNode<'t>>(filter: &FilterExpr, node: N, cx: Cx<'_, '_, N>) -> bool {
    match filter {
        FilterExpr::Or(left, right) => {
            eval_filter(left, node, cx) || eval_filter(right, node, cx)
        }
        FilterExpr::And(left, right) => {
            eval_filter(left, node, cx) && eval_filter(right, node, cx)
        }
        FilterExpr::Compare(c) => {
            let equal = operand_value(&c.operand, node).as_deref() == Some(c.value.as_str());
            equal != c.negated
        }
        FilterExpr::Matches(m) => match operand_value(&m.operand, node) {
            Some(value) => m.regex.is_match(&value) != m.negated,
            None => m.negated,
        },
        FilterExpr::Attr(name) => node.attr(name).map_or(false, |value| !value.is_empty()),
        FilterExpr::Text => !node.text().is_empty(),
        FilterExpr::Call(name) => cx.filters.call(name, node),
    }
}

fn operand_value<'t, N: TreeNode<'t>>(operand: &Operand, node: N) -> Option<String> {
    match operand {
        Operand::Attr(name) => node.attr(name).map(str::to_string),
        Operand::Text => Some(node.text()),
    }
}
