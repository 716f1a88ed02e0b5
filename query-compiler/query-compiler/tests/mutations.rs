mod common;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use common::*;
use graph_value::GraphValue;
use pretty_assertions::assert_eq;
use query_compiler::{
    BoxError, CallbackRegistry, CompileContext, CompileError, CreateStrategy, RESOLVED_CALLBACKS, compile_with_fallback,
};
use schema_model::Selection;
use serde_json::json;

fn counting_ids() -> CallbackRegistry {
    let counter = Arc::new(AtomicUsize::new(0));

    CallbackRegistry::new().register("uuid", move |_parent: GraphValue| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, BoxError>(GraphValue::from(format!("id-{n}"))) }
    })
}

fn create_movies(input: serde_json::Value) -> Selection {
    Selection::new("createMovies")
        .argument("input", value(input))
        .select([Selection::new("movies").select([Selection::new("title")])])
}

#[test]
fn single_rows_resolve_callbacks_into_their_slot() {
    let context = CompileContext::builder().callbacks(counting_ids()).build();
    let query = compile(&create_movies(json!([{ "title": "Heat" }])), &context).unwrap();

    assert!(query.text.contains("this0.id = $resolvedCallbacks.this0_id_uuid"));
    assert_eq!(
        query.params.get(RESOLVED_CALLBACKS),
        Some(&value(json!({ "this0_id_uuid": "id-0" })))
    );
}

#[test]
fn batched_rows_resolve_callbacks_in_row_order() {
    let context = CompileContext::builder().callbacks(counting_ids()).build();
    let query = compile(&create_movies(json!([{ "title": "Heat" }, { "title": "Ronin" }])), &context).unwrap();

    assert!(query.text.starts_with("UNWIND $create_param0 AS create_var0\n"));

    let rows = query.params.get("create_param0").and_then(GraphValue::as_list).unwrap();
    assert_eq!(rows[0].get("id"), Some(&GraphValue::from("id-0")));
    assert_eq!(rows[1].get("id"), Some(&GraphValue::from("id-1")));
    assert_eq!(rows[1].get("title"), Some(&GraphValue::from("Ronin")));
}

#[test]
fn unregistered_callbacks_fail_resolution() {
    let result = compile(&create_movies(json!({ "title": "Heat" })), &CompileContext::default());

    assert!(matches!(result, Err(CompileError::Callback { name, .. }) if name == "uuid"));
}

#[test]
fn pending_callbacks_are_listed_before_resolution() {
    let pending = translate(&create_movies(json!({ "title": "Heat" })), &CompileContext::default()).unwrap();

    assert_eq!(pending.callbacks().len(), 1);
    assert_eq!(pending.params.get(RESOLVED_CALLBACKS), Some(&GraphValue::Object(Vec::new())));
}

#[test]
fn batching_is_refused_when_events_are_needed() {
    let context = CompileContext::builder()
        .subscriptions_enabled(true)
        .callbacks(counting_ids())
        .build();
    let selection = create_movies(json!([{ "title": "Heat" }, { "title": "Ronin" }]));

    assert!(matches!(
        translate(&selection, &context),
        Err(CompileError::UnsupportedOptimization(_))
    ));

    let query = futures::executor::block_on(compile_with_fallback(&schema(), &selection, &context)).unwrap();

    assert!(!query.text.contains("UNWIND $"));
    assert!(query.text.contains("CREATE (this0:`Movie`)"));
    assert_eq!(query.text.matches("CREATE (").count(), 2);
    assert!(query.text.ends_with("AS meta"));
}

#[test]
fn per_row_strategy_never_batches() {
    let context = CompileContext::builder()
        .create_strategy(CreateStrategy::PerRow)
        .callbacks(counting_ids())
        .build();
    let query = compile(&create_movies(json!([{ "title": "Heat" }, { "title": "Ronin" }])), &context).unwrap();

    assert!(!query.text.contains("UNWIND $"));
    assert_eq!(query.params.get(RESOLVED_CALLBACKS).and_then(GraphValue::as_object).map(<[_]>::len), Some(2));
}

#[test]
fn deletes_happen_after_every_branch_is_collected() {
    let selection = Selection::new("deleteMovies")
        .argument("where", value(json!({ "title": "Heat" })))
        .argument("delete", value(json!({ "actors": [{ "delete": { "movies": [{}] } }] })));

    let query = compile(&selection, &CompileContext::default()).unwrap();

    let last_match = query.text.rfind("OPTIONAL MATCH").unwrap();
    let first_delete = query.text.find("DETACH DELETE").unwrap();

    assert!(last_match < first_delete);
    assert!(query.text.ends_with("\nDETACH DELETE this"));
    assert_eq!(query.text.matches("DETACH DELETE").count(), 3);
}

#[test]
fn updates_stay_scoped_to_the_owner() {
    let selection = Selection::new("updatePosts")
        .argument("where", value(json!({ "id": "1" })))
        .argument("update", value(json!({ "id": "2" })))
        .select([Selection::new("posts").select([Selection::new("id")])]);

    let query = compile(&selection, &signed_in("u1")).unwrap();

    assert!(query.text.contains("this.authorId = $param1"));
    assert_eq!(query.params.get("param1"), Some(&GraphValue::from("u1")));
    assert!(query.text.contains("SET this.id = $this_update_param2"));
}

#[test]
fn creating_guarded_nodes_needs_a_token() {
    let selection = Selection::new("createPosts").argument("input", value(json!({ "id": "1", "authorId": "u1" })));

    assert_eq!(
        translate(&selection, &CompileContext::default()).err(),
        Some(CompileError::AuthenticationRequired)
    );
}
