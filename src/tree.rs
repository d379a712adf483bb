// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The boundary between the matching engine and the tree it inspects.
//!
//! The engine never parses markup and never mutates a tree.  Everything it needs from a document
//! goes through the [`TreeNode`] trait: a cheap `Copy` handle that can report its tag, classes,
//! id, attributes, text, and ordered element children.  Any DOM library can be adapted by
//! implementing the trait for its node handle; this module also ships a small arena-backed
//! [`Document`] that serves as the reference implementation and as the test vehicle.

use std::fmt;

/// A read-only handle onto one element of an external tree.
///
/// Handles are `Copy` and compare equal exactly when they denote the same element of the same
/// tree.  All operations must be side-effect-free and stable for the duration of a match.
pub trait TreeNode<'t>: Copy + PartialEq + fmt::Debug {
    type Classes: Iterator<Item = &'t str>;
    type Children: Iterator<Item = Self>;

    /// The element's tag name.
    fn tag_name(&self) -> &'t str;

    /// The element's id, if it has one.
    fn id(&self) -> Option<&'t str>;

    /// The element's CSS classes, in document order.
    fn classes(&self) -> Self::Classes;

    /// The value of the named attribute.  Absent and present-but-empty are distinguished.
    fn attr(&self, name: &str) -> Option<&'t str>;

    /// The text content of the element and its descendants, concatenated in document order.
    fn text(&self) -> String;

    /// The element children, in document order.  Text children are not visible to the engine.
    fn children(&self) -> Self::Children;

    /// The parent element, if any.
    fn parent(&self) -> Option<Self>;
}

/// All descendants of `node` in document order (pre-order), excluding `node` itself.
pub fn descendants<'t, N: TreeNode<'t>>(node: N) -> Descendants<N> {
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    Descendants { stack }
}

pub struct Descendants<N> {
    stack: Vec<N>,
}

impl<'t, N: TreeNode<'t>> Iterator for Descendants<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let node = self.stack.pop()?;
        let first = self.stack.len();
        self.stack.extend(node.children());
        self.stack[first..].reverse();
        Some(node)
    }
}

/// The element sibling immediately following `node`, if any.
pub fn next_sibling<'t, N: TreeNode<'t>>(node: N) -> Option<N> {
    following_siblings(node).next()
}

/// All element siblings after `node`, in document order.
pub fn following_siblings<'t, N: TreeNode<'t>>(node: N) -> impl Iterator<Item = N> + use<'t, N> {
    let mut siblings = node.parent().map(|p| p.children());
    let mut found = false;
    std::iter::from_fn(move || {
        let siblings = siblings.as_mut()?;
        loop {
            let next = siblings.next()?;
            if found {
                return Some(next);
            }
            if next == node {
                found = true;
            }
        }
    })
}

/// Whether `node` is the first element child of its parent.  A parentless node counts as first.
pub fn is_first_child<'t, N: TreeNode<'t>>(node: N) -> bool {
    match node.parent() {
        Some(parent) => parent.children().next() == Some(node),
        None => true,
    }
}

// ------------------------------------------------------------------------------------------------
// Reference implementation

/// A nested element description used to build a [`Document`].
#[derive(Debug)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    children: Vec<Child>,
}

#[derive(Debug)]
enum Child {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Element {
        Element {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Element {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Element {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Element {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Appends a text child.
    pub fn text(mut self, text: impl Into<String>) -> Element {
        self.children.push(Child::Text(text.into()));
        self
    }

    /// Appends an element child.
    pub fn child(mut self, child: Element) -> Element {
        self.children.push(Child::Element(child));
        self
    }
}

/// An immutable tree of elements with interleaved text, stored in an arena.
pub struct Document {
    nodes: Vec<NodeData>,
}

struct NodeData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    parent: Option<usize>,
    parts: Vec<Part>,
}

enum Part {
    Element(usize),
    Text(String),
}

impl Document {
    /// Builds a document from a nested element description.  The element becomes the root.
    pub fn build(root: Element) -> Document {
        let mut document = Document { nodes: Vec::new() };
        document.add(root, None);
        document
    }

    fn add(&mut self, element: Element, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(NodeData {
            tag: element.tag,
            id: element.id,
            classes: element.classes,
            attrs: element.attrs,
            parent,
            parts: Vec::new(),
        });
        for child in element.children {
            let part = match child {
                Child::Element(child) => Part::Element(self.add(child, Some(index))),
                Child::Text(text) => Part::Text(text),
            };
            self.nodes[index].parts.push(part);
        }
        index
    }

    /// The root element of the document.
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            document: self,
            index: 0,
        }
    }

    fn collect_text(&self, index: usize, out: &mut String) {
        for part in &self.nodes[index].parts {
            match part {
                Part::Element(child) => self.collect_text(*child, out),
                Part::Text(text) => out.push_str(text),
            }
        }
    }
}

/// A handle onto one element of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    document: &'a Document,
    index: usize,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a NodeData {
        &self.document.nodes[self.index]
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &NodeRef) -> bool {
        self.index == other.index && std::ptr::eq(self.document, other.document)
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} #{}>", self.data().tag, self.index)
    }
}

impl<'a> TreeNode<'a> for NodeRef<'a> {
    type Classes = std::iter::Map<std::slice::Iter<'a, String>, fn(&String) -> &str>;
    type Children = NodeChildren<'a>;

    fn tag_name(&self) -> &'a str {
        &self.data().tag
    }

    fn id(&self) -> Option<&'a str> {
        self.data().id.as_deref()
    }

    fn classes(&self) -> Self::Classes {
        self.data().classes.iter().map(String::as_str)
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn text(&self) -> String {
        let mut out = String::new();
        self.document.collect_text(self.index, &mut out);
        out
    }

    fn children(&self) -> Self::Children {
        NodeChildren {
            document: self.document,
            parts: self.data().parts.iter(),
        }
    }

    fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent.map(|index| NodeRef {
            document: self.document,
            index,
        })
    }
}

pub struct NodeChildren<'a> {
    document: &'a Document,
    parts: std::slice::Iter<'a, Part>,
}

impl<'a> Iterator for NodeChildren<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<NodeRef<'a>> {
        loop {
            match self.parts.next()? {
                Part::Element(index) => {
                    return Some(NodeRef {
                        document: self.document,
                        index: *index,
                    })
                }
                Part::Text(_) => {}
            }
        }
    }
}
