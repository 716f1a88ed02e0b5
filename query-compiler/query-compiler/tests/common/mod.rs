#![allow(dead_code)]

use graph_value::GraphValue;
use query_compiler::{CompileContext, CompileResult, CompiledQuery, PendingQuery};
use schema_model::{SchemaDefinition, SchemaModel, Selection};
use serde_json::json;

/// Movies, the people around them, and posts guarded by ownership rules.
pub(crate) fn schema() -> SchemaModel {
    let definition: SchemaDefinition = serde_json::from_value(json!({
        "nodes": [
            {
                "name": "Movie",
                "fields": [
                    { "name": "id", "type": "ID", "populatedBy": { "callback": "uuid", "operations": ["CREATE"] } },
                    { "name": "title", "type": "String" },
                    { "name": "released", "type": "Int" }
                ],
                "relationFields": [
                    { "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor", "properties": "ActedIn" }
                ]
            },
            {
                "name": "Actor",
                "fields": [{ "name": "name", "type": "String" }],
                "relationFields": [
                    { "name": "movies", "type": "ACTED_IN", "direction": "OUT", "target": "Movie", "properties": "ActedIn" }
                ]
            },
            {
                "name": "Post",
                "fields": [{ "name": "id", "type": "ID" }, { "name": "authorId", "type": "ID" }],
                "auth": [
                    { "operations": ["READ", "UPDATE", "DELETE"], "where": { "authorId": "$jwt.sub" } },
                    { "operations": ["CREATE"], "isAuthenticated": true }
                ]
            }
        ],
        "relationshipProperties": [{ "name": "ActedIn", "fields": [{ "name": "role", "type": "String" }] }]
    }))
    .unwrap();

    SchemaModel::build(definition).unwrap()
}

pub(crate) fn value(json: serde_json::Value) -> GraphValue {
    GraphValue::try_from(json).unwrap()
}

pub(crate) fn signed_in(sub: &str) -> CompileContext {
    CompileContext::builder().jwt(value(json!({ "sub": sub }))).build()
}

pub(crate) fn translate(selection: &Selection, context: &CompileContext) -> CompileResult<PendingQuery> {
    query_compiler::translate(&schema(), selection, context)
}

pub(crate) fn compile(selection: &Selection, context: &CompileContext) -> CompileResult<CompiledQuery> {
    futures::executor::block_on(query_compiler::compile(&schema(), selection, context))
}
