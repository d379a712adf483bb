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
use tql::Shape;
use tql::TreeNode;
use tql::Value;

fn el(tag: &str) -> Element {
    Element::new(tag)
}

fn run<'a>(doc: &'a Document, query: &str) -> Vec<Value<NodeRef<'a>>> {
    let pattern = compile(query).unwrap_or_else(|e| panic!("Cannot compile `{}`: {}", query, e));
    pattern
        .matches(doc.root(), &Filters::new())
        .unwrap_or_else(|e| panic!("Cannot match `{}`: {}", query, e))
        .collect()
}

fn s<N>(value: &str) -> Value<N> {
    Value::Str(value.into())
}

fn tup<N>(values: Vec<Value<N>>) -> Value<N> {
    Value::Tuple(values)
}

fn list<N>(values: Vec<Value<N>>) -> Value<N> {
    Value::List(values)
}

/// `<div><a>1</a><b>2</b><c>3</c></div>`
fn sibling_doc() -> Document {
    Document::build(
        el("div")
            .child(el("a").text("1"))
            .child(el("b").text("2"))
            .child(el("c").text("3")),
    )
}

// ------------------------------------------------------------------------------------------------
// The end-to-end scenarios

#[test]
fn extracts_text_and_attributes_from_one_element() {
    let doc = Document::build(
        el("html").child(
            el("div")
                .id("find-me")
                .attr("data-attr", "world")
                .text("hello"),
        ),
    );
    assert_eq!(
        run(&doc, "div#find-me[txt, .data-attr]"),
        vec![tup(vec![s("hello"), s("world")])],
    );
}

#[test]
fn direct_child_edge_tries_every_child() {
    let doc = Document::build(
        el("div")
            .child(el("a").text("x"))
            .child(el("a").text("y")),
    );
    assert_eq!(
        run(&doc, "div > a[txt]"),
        vec![tup(vec![s("x")]), tup(vec![s("y")])],
    );
}

#[test]
fn descendant_edge_reaches_any_depth() {
    let doc = Document::build(el("div").child(el("p").child(el("a").text("x"))));
    assert_eq!(run(&doc, "div >> a[txt]"), vec![tup(vec![s("x")])]);
    assert_eq!(run(&doc, "div > a[txt]"), vec![]);
}

#[test]
fn breadth_boundaries_pin_the_whole_child_list() {
    let doc = Document::build(el("p").child(el("a").text("1")).child(el("b").text("2")));
    assert_eq!(
        run(&doc, "{ $ : a[txt] : b[txt] : $ }"),
        vec![tup(vec![s("1"), s("2")])],
    );

    let longer = Document::build(
        el("p")
            .child(el("a").text("1"))
            .child(el("b").text("2"))
            .child(el("c")),
    );
    assert_eq!(run(&longer, "{ $ : a[txt] : b[txt] : $ }"), vec![]);
}

#[test]
fn repetition_spans_nested_levels() {
    let doc = Document::build(
        el("div").child(el("span").child(el("span").child(el("a").text("x")))),
    );
    assert_eq!(
        run(&doc, "div > (span >)* > a[txt]"),
        vec![tup(vec![s("x")])],
    );
}

#[test]
fn filters_guard_matched_elements() {
    let doc = Document::build(
        el("body")
            .child(el("div").attr("k", "v").text("hi"))
            .child(el("div").attr("k", "w").text("bye")),
    );
    assert_eq!(run(&doc, "div~(.k == 'v')[txt]"), vec![tup(vec![s("hi")])]);
}

#[test]
fn negated_tag_tests_exclude_classes() {
    let doc = Document::build(
        el("body")
            .child(el("div").text("a"))
            .child(el("div").class("hidden").text("b")),
    );
    assert_eq!(run(&doc, "div!.hidden[txt]"), vec![tup(vec![s("a")])]);
}

#[test]
fn alternation_tries_arms_in_source_order() {
    let doc = Document::build(
        el("body")
            .child(el("a").text("1"))
            .child(el("b").text("2"))
            .child(el("c").text("3")),
    );
    assert_eq!(
        run(&doc, "(a | b)[txt]"),
        vec![tup(vec![s("1")]), tup(vec![s("2")])],
    );
}

// ------------------------------------------------------------------------------------------------
// Rooting and boundaries

#[test]
fn matches_root_at_every_element_in_document_order() {
    let doc = Document::build(
        el("body")
            .child(el("div").child(el("a").text("1")))
            .child(el("a").text("2")),
    );
    assert_eq!(
        run(&doc, "a[txt]"),
        vec![tup(vec![s("1")]), tup(vec![s("2")])],
    );
}

#[test]
fn dollar_alone_matches_the_document_root() {
    let doc = Document::build(el("p").child(el("p")));
    assert_eq!(run(&doc, "$"), vec![tup(vec![])]);
}

#[test]
fn dollar_prefix_anchors_at_the_root() {
    let doc = Document::build(el("p").child(el("p")));
    assert_eq!(
        run(&doc, "$ > @[node]"),
        vec![tup(vec![Value::Node(doc.root())])],
    );
    assert_eq!(run(&doc, "$ > p").len(), 1);
}

#[test]
fn trailing_dollar_asserts_a_leaf_on_the_depth_axis() {
    let doc = Document::build(el("p").child(el("p")));
    let inner = doc.root().children().next().unwrap();
    assert_eq!(
        run(&doc, "@[node] > $"),
        vec![tup(vec![Value::Node(inner)])],
    );
}

#[test]
fn breadth_dollar_asserts_first_and_last_siblings() {
    let doc = sibling_doc();
    assert_eq!(run(&doc, "{$ : a[txt]}"), vec![tup(vec![s("1")])]);
    assert_eq!(run(&doc, "{$ : b[txt]}"), vec![]);
    assert_eq!(run(&doc, "{c[txt] : $}"), vec![tup(vec![s("3")])]);
    assert_eq!(run(&doc, "{b[txt] : $}"), vec![]);
}

// ------------------------------------------------------------------------------------------------
// Breadth traversal

#[test]
fn adjacent_edge_requires_the_very_next_sibling() {
    let doc = sibling_doc();
    assert_eq!(
        run(&doc, "{a[txt] : b[txt]}"),
        vec![tup(vec![s("1"), s("2")])],
    );
    assert_eq!(run(&doc, "{a[txt] : c[txt]}"), vec![]);
}

#[test]
fn following_edge_skips_intervening_siblings() {
    let doc = sibling_doc();
    assert_eq!(
        run(&doc, "{a[txt] :: c[txt]}"),
        vec![tup(vec![s("1"), s("3")])],
    );
}

#[test]
fn breadth_star_consumes_sibling_runs() {
    let doc = sibling_doc();
    assert_eq!(run(&doc, "{a : (b :)* : c[txt]}"), vec![tup(vec![s("3")])]);
    assert_eq!(run(&doc, "{a : (b :)+ : c[txt]}"), vec![tup(vec![s("3")])]);

    let short = Document::build(el("div").child(el("a")).child(el("c").text("3")));
    assert_eq!(run(&short, "{a : (b :)* : c[txt]}"), vec![tup(vec![s("3")])]);
    assert_eq!(run(&short, "{a : (b :)+ : c[txt]}"), vec![]);
}

#[test]
fn breadth_star_records_occurrences() {
    let doc = sibling_doc();
    assert_eq!(
        run(&doc, "{a : (b[txt] :)* : c}"),
        vec![tup(vec![list(vec![s("2")])])],
    );

    let short = Document::build(el("div").child(el("a")).child(el("c")));
    assert_eq!(
        run(&short, "{a : (b[txt] :)* : c}"),
        vec![tup(vec![list(vec![])])],
    );
}

// ------------------------------------------------------------------------------------------------
// Depth repetition and optionals

#[test]
fn plus_requires_at_least_one_level() {
    let doc = Document::build(
        el("body").child(el("i").child(el("i").child(el("b").text("12345")))),
    );
    assert_eq!(
        run(&doc, "body > (i >)+ > b[txt]"),
        vec![tup(vec![s("12345")])],
    );
    assert_eq!(run(&doc, "body > b[txt]"), vec![]);
}

#[test]
fn star_gives_back_one_occurrence_per_backtrack() {
    let doc = Document::build(el("div").child(el("span").text("y").child(el("span").text("x"))));
    // Greedy: the two-level match enumerates before the one-level one.
    assert_eq!(
        run(&doc, "div > (span >)* > span[txt]"),
        vec![tup(vec![s("x")]), tup(vec![s("yx")])],
    );
}

#[test]
fn optional_skips_one_level() {
    let doc = Document::build(
        el("body")
            .child(el("p").text("first"))
            .child(el("div").child(el("p").text("second"))),
    );
    assert_eq!(
        run(&doc, "body > div? > p[txt]"),
        vec![tup(vec![s("first")]), tup(vec![s("second")])],
    );
}

#[test]
fn optional_with_extractors_yields_the_absent_sentinel() {
    let doc = Document::build(el("body").child(el("a").text("1")));
    assert_eq!(
        run(&doc, "body > (a[txt])?"),
        vec![tup(vec![s("1")]), tup(vec![Value::Absent])],
    );
}

#[test]
fn extractors_apply_to_the_last_matched_element_of_a_group() {
    let doc = Document::build(
        el("ul")
            .child(el("li").text("x"))
            .child(el("li").text("y")),
    );
    assert_eq!(
        run(&doc, "(ul > li?)[txt]"),
        vec![
            tup(vec![s("x")]),
            tup(vec![s("xy")]),
            tup(vec![s("y")]),
            tup(vec![s("xy")]),
        ],
    );
}

// ------------------------------------------------------------------------------------------------
// Axis switching

#[test]
fn switch_head_restricts_the_parent() {
    let doc = Document::build(
        el("body")
            .child(el("div").class("wrap").child(el("a").text("1")))
            .child(el("a").text("2")),
    );
    assert_eq!(run(&doc, ".wrap {a[txt]}"), vec![tup(vec![s("1")])]);
}

#[test]
fn depth_then_breadth() {
    let doc = Document::build(
        el("body").child(
            el("div")
                .child(el("a").text("1"))
                .child(el("b").text("2"))
                .child(el("c").text("3")),
        ),
    );
    assert_eq!(
        run(&doc, "body > div {$ : a[txt] : b[txt] : c : $}"),
        vec![tup(vec![s("1"), s("2")])],
    );
}

#[test]
fn breadth_then_depth_resumes_the_sibling_cursor() {
    let doc = Document::build(
        el("div")
            .child(el("p").text("l"))
            .child(el("i").child(el("b").text("x")))
            .child(el("p").text("r")),
    );
    assert_eq!(
        run(&doc, "{p : {i > b[txt]} : p}"),
        vec![tup(vec![s("x")])],
    );
}

#[test]
fn standalone_block_matches_any_parent() {
    let doc = Document::build(el("p").child(el("a").text("1")));
    assert_eq!(run(&doc, "{a[txt]}"), vec![tup(vec![s("1")])]);
}

// ------------------------------------------------------------------------------------------------
// Extraction and invariants

#[test]
fn extractors_read_text_nodes_and_attributes() {
    let doc = Document::build(el("a").id("x").attr("href", "/h").text("hi"));
    assert_eq!(
        run(&doc, "a[txt, node, .href, .missing]"),
        vec![tup(vec![s("hi"), Value::Node(doc.root()), s("/h"), s("")])],
    );
}

#[test]
fn text_aggregates_descendants_in_document_order() {
    let doc = Document::build(
        el("ul")
            .child(el("li").text("a1"))
            .child(el("li").text("b2")),
    );
    let results = run(&doc, "$ > @[txt]");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], tup(vec![s("a1b2")]));
}

#[test]
fn patterns_without_extractors_yield_empty_tuples() {
    let doc = Document::build(el("div").child(el("a")).child(el("a")));
    assert_eq!(run(&doc, "div > a"), vec![tup(vec![]), tup(vec![])]);
    assert_eq!(run(&doc, "div > b"), vec![]);
}

fn conforms<N>(value: &Value<N>, shape: &Shape) -> bool {
    match (value, shape) {
        (Value::Str(_), Shape::Scalar) | (Value::Node(_), Shape::Scalar) => true,
        (Value::Tuple(values), Shape::Tuple(shapes)) => {
            values.len() == shapes.len()
                && values
                    .iter()
                    .zip(shapes)
                    .all(|(value, shape)| conforms(value, shape))
        }
        (Value::List(values), Shape::List(inner)) => {
            values.iter().all(|value| conforms(value, inner))
        }
        (Value::Absent, Shape::Optional(_)) => true,
        (value, Shape::Optional(inner)) => conforms(value, inner),
        _ => false,
    }
}

#[test]
fn every_result_conforms_to_the_compiled_shape() -> anyhow::Result<()> {
    let doc = sibling_doc();
    let queries = [
        "{a[txt] : (b[txt] :)* : c[txt]}",
        "div > (a[txt])?",
        "(a | b)[txt]",
        "div > @",
        "{$ : a[node] :: c[txt] : $}",
    ];
    for query in queries {
        let pattern = compile(query)?;
        let filters = Filters::new();
        for value in pattern.matches(doc.root(), &filters)? {
            assert!(
                conforms(&value, pattern.shape()),
                "result {:?} of `{}` does not conform to shape {}",
                value,
                query,
                pattern.shape(),
            );
        }
    }
    Ok(())
}

#[test]
fn compiled_patterns_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<tql::Pattern>();
}

#[test]
fn enumeration_is_deterministic() {
    let doc = sibling_doc();
    let query = "{@[txt] :: @[txt]}";
    assert_eq!(run(&doc, query), run(&doc, query));
    assert!(!run(&doc, query).is_empty());
}
