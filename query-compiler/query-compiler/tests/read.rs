mod common;

use common::*;
use graph_value::GraphValue;
use pretty_assertions::assert_eq;
use query_compiler::{CompileContext, CompileError};
use schema_model::Selection;
use serde_json::json;

fn movies_with_actor_page() -> Selection {
    Selection::new("movies")
        .argument("where", value(json!({ "title": "X" })))
        .select([Selection::new("actorsConnection").argument("first", 1).select([
            Selection::new("edges").select([Selection::new("node").select([Selection::new("name")])]),
        ])])
}

#[test]
fn connection_pages_bind_only_the_filter_value() {
    let query = compile(&movies_with_actor_page(), &CompileContext::default()).unwrap();

    assert!(query.text.starts_with("MATCH (this:`Movie`)\nWHERE this.title = $param0\n"));
    assert!(query.text.contains("LIMIT 1"));
    assert!(query.text.contains(":ACTED_IN]-("));
    assert!(query.text.contains(":`Actor`)"));
    assert_eq!(
        query.params.into_iter().collect::<Vec<_>>(),
        vec![("param0".to_owned(), GraphValue::from("X"))]
    );
}

#[test]
fn identical_requests_compile_identically() {
    let first = compile(&movies_with_actor_page(), &CompileContext::default()).unwrap();
    let second = compile(&movies_with_actor_page(), &CompileContext::default()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn generated_names_are_never_reused() {
    let selection = Selection::new("movies")
        .argument("where", value(json!({ "OR": [{ "title": "A" }, { "title": "B" }, { "released_GT": 1990 }] })))
        .select([
            Selection::new("title"),
            Selection::new("actors")
                .argument("where", value(json!({ "name": "Al" })))
                .select([Selection::new("name")]),
            Selection::new("actorsConnection").argument("first", 1).select([
                Selection::new("totalCount"),
                Selection::new("edges").select([Selection::new("node").select([Selection::new("name")])]),
            ]),
        ]);

    let query = compile(&selection, &CompileContext::default()).unwrap();

    assert_eq!(query.params.len(), 4);

    for name in query.params.keys() {
        assert_eq!(query.text.matches(&format!("${name}")).count(), 1, "{name}");
    }

    let mut binders: Vec<_> = query
        .text
        .split(" AS ")
        .skip(1)
        .filter_map(|rest| rest.split(|c: char| !(c.is_alphanumeric() || c == '_')).next())
        .collect();

    assert!(binders.len() > 1);

    binders.sort_unstable();
    let before = binders.len();
    binders.dedup();

    assert_eq!(binders.len(), before, "{}", query.text);
}

#[test]
fn unknown_roots_are_schema_errors() {
    let result = translate(&Selection::new("films"), &CompileContext::default());

    assert_eq!(
        result.err(),
        Some(CompileError::SchemaReference {
            parent: "Query".into(),
            name: "films".into()
        })
    );
}

#[test]
fn rule_predicates_survive_any_request_filter() {
    let selection = Selection::new("posts")
        .argument("where", value(json!({ "OR": [{ "authorId": "someone-else" }, { "id": "1" }] })))
        .select([Selection::new("id")]);

    let query = compile(&selection, &signed_in("u1")).unwrap();

    assert!(query.text.contains(" AND (this.authorId IS NOT NULL AND this.authorId = $param2))"));
    assert_eq!(query.params.get("param2"), Some(&GraphValue::from("u1")));
}

#[test]
fn anonymous_requests_cannot_read_owned_nodes() {
    let selection = Selection::new("posts").select([Selection::new("id")]);

    assert_eq!(
        translate(&selection, &CompileContext::default()).err(),
        Some(CompileError::AuthenticationRequired)
    );
}
