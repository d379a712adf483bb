// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use tql::compile;
use tql::tree::Document;
use tql::tree::Element;
use tql::tree::NodeRef;
use tql::Filters;
use tql::MatchError;
use tql::TreeNode;
use tql::Value;

/// `<ul>` with four `<li>` items: data-x=1/2/3 on the first three, data-y on the second,
/// an empty data-z on the third, and an entirely bare fourth.
fn doc() -> Document {
    Document::build(
        Element::new("ul")
            .child(Element::new("li").attr("data-x", "1").text("a1"))
            .child(
                Element::new("li")
                    .attr("data-x", "2")
                    .attr("data-y", "hai")
                    .text("b2"),
            )
            .child(
                Element::new("li")
                    .attr("data-x", "3")
                    .attr("data-z", "")
                    .text("c3"),
            )
            .child(Element::new("li")),
    )
}

fn run<'a>(doc: &'a Document, query: &str) -> Vec<Value<NodeRef<'a>>> {
    run_with(doc, query, &Filters::new())
}

fn run_with<'a>(
    doc: &'a Document,
    query: &str,
    filters: &Filters<NodeRef<'a>>,
) -> Vec<Value<NodeRef<'a>>> {
    let pattern = compile(query).unwrap_or_else(|e| panic!("Cannot compile `{}`: {}", query, e));
    pattern
        .matches(doc.root(), filters)
        .unwrap_or_else(|e| panic!("Cannot match `{}`: {}", query, e))
        .collect()
}

fn texts<'a>(doc: &'a Document, query: &str) -> Vec<String> {
    run(doc, query)
        .into_iter()
        .map(|value| match value {
            Value::Tuple(mut values) => match values.remove(0) {
                Value::Str(text) => text,
                other => panic!("Expected a string, got {:?}", other),
            },
            other => panic!("Expected a tuple, got {:?}", other),
        })
        .collect()
}

#[test]
fn bare_attribute_is_truthy_when_present_and_non_empty() {
    let doc = doc();
    assert_eq!(texts(&doc, "@~(.data-x)[txt]"), vec!["a1", "b2", "c3"]);
    // Present but empty is falsy.
    assert_eq!(texts(&doc, "@~(.data-z)[txt]"), Vec::<String>::new());
}

#[test]
fn equality_distinguishes_absent_from_empty() {
    let doc = doc();
    assert_eq!(texts(&doc, "li~(.data-z == '')[txt]"), vec!["c3"]);
    assert_eq!(texts(&doc, "li~(txt == 'b2')[.data-x]"), vec!["2"]);
    // An absent attribute compares unequal to everything.
    assert_eq!(texts(&doc, "li~(.data-y != 'hai')[txt]"), vec!["a1", "c3", ""]);
}

#[test]
fn bare_text_is_truthy_when_non_empty() {
    let doc = doc();
    assert_eq!(texts(&doc, "li~(txt)[.data-x]"), vec!["1", "2", "3"]);
}

#[test]
fn conjunction_binds_tighter_than_disjunction() {
    let doc = doc();
    assert_eq!(
        texts(&doc, "@~(.data-x && .data-y)[txt]"),
        vec!["b2"],
    );
    assert_eq!(
        texts(&doc, "@~(.data-x && .data-y || .data-z == '')[txt]"),
        vec!["b2", "c3"],
    );
}

#[test]
fn regex_tests_use_compiled_patterns() {
    let doc = doc();
    assert_eq!(texts(&doc, r"li~(txt ~~ '\d')[txt]"), vec!["a1", "b2", "c3"]);
    assert_eq!(texts(&doc, r"li~(txt ~~ '^b')[txt]"), vec!["b2"]);
    assert_eq!(texts(&doc, r"li~(txt !~ '\d')[txt]"), vec![""]);
}

#[test]
fn regex_on_an_absent_attribute_never_matches() {
    let doc = doc();
    assert_eq!(texts(&doc, r"li~(.data-y ~~ 'h')[txt]"), vec!["b2"]);
    assert_eq!(
        texts(&doc, r"li~(.data-y !~ 'h')[txt]"),
        vec!["a1", "c3", ""],
    );
}

#[test]
fn user_filter_functions_see_the_element() {
    let doc = doc();
    let mut filters = Filters::new();
    filters.add("marked", |node: NodeRef| node.attr("data-y").is_some());
    assert_eq!(
        run_with(&doc, "li~($marked)[txt]", &filters),
        vec![Value::Tuple(vec![Value::Str("b2".into())])],
    );
}

#[test]
fn filter_functions_combine_with_attribute_tests() {
    let doc = doc();
    let mut filters = Filters::new();
    filters.add("has-digit", |node: NodeRef| {
        node.text().chars().any(|c| c.is_ascii_digit())
    });
    assert_eq!(
        run_with(&doc, "li~(($has-digit) && .data-x == '1')[txt]", &filters),
        vec![Value::Tuple(vec![Value::Str("a1".into())])],
    );
}

#[test]
fn unknown_filter_names_fail_before_enumeration() {
    let doc = doc();
    let pattern = compile("li~($nope)[txt]").unwrap();
    match pattern.matches(doc.root(), &Filters::<NodeRef>::new()) {
        Err(MatchError::UnknownFilter(name)) => assert_eq!(name, "nope"),
        Ok(_) => panic!("Expected an unknown filter error"),
    };
}
