//! Compiles GraphQL-style selection trees against a [`SchemaModel`] into one parameterized
//! Cypher statement.
//!
//! Compilation is split in two steps. [`translate`] assembles and renders the query, leaving
//! values produced by callbacks as pending slots. [`PendingQuery::resolve`] then runs those
//! callbacks and fills in the parameter map. [`compile`] does both.

mod binding;
mod callbacks;
mod context;
mod error;
mod subscription;
mod translate;

pub use binding::{RELATIONSHIP_REQUIRED, RESOLVED_CALLBACKS};
pub use callbacks::{BoxError, Callback, CallbackBucket, CallbackRegistry, CallbackResult, PathSegment, PendingCallback};
pub use context::{CompileContext, CreateStrategy};
pub use error::{CardinalityViolation, CompileError, CompileResult};
pub use subscription::{
    NodeEvent, NodeProperties, RelationshipEvent, RelationshipProperties, Subscription, SubscriptionEvent,
    SubscriptionFilter, SubscriptionKind,
};
pub use translate::offset_to_cursor;

use cypher_builder::visitor::Cypher;
use graph_value::GraphValue;
use indexmap::IndexMap;
use schema_model::{SchemaModel, Selection};
use serde::Serialize;
use tracing::{debug, trace};

use crate::translate::{RootOperation, Translator};

/// Query text and parameters, ready to be sent to the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub text: String,
    pub params: IndexMap<String, GraphValue>,
}

/// A rendered query whose callback values are not computed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub text: String,
    pub params: IndexMap<String, GraphValue>,
    callbacks: Vec<PendingCallback>,
}

impl PendingQuery {
    pub fn callbacks(&self) -> &[PendingCallback] {
        &self.callbacks
    }

    /// Runs the pending callbacks in registration order and stores their results.
    pub async fn resolve(self, registry: &CallbackRegistry) -> CompileResult<CompiledQuery> {
        let PendingQuery {
            text,
            mut params,
            callbacks,
        } = self;

        debug!(callbacks = callbacks.len(), "resolving callbacks");
        CallbackBucket::resolve(callbacks, registry, &mut params).await?;

        Ok(CompiledQuery { text, params })
    }
}

/// Builds the query for the root field `selection` names.
#[tracing::instrument(skip_all, fields(root = %selection.name))]
pub fn translate(schema: &SchemaModel, selection: &Selection, context: &CompileContext) -> CompileResult<PendingQuery> {
    let operation = RootOperation::resolve(schema, &selection.name)?;
    let translator = Translator::new(schema, context);

    let clause = translator.translate(operation, selection)?;
    let rendered = Cypher::build(&clause, &translator.env)?;

    trace!(query = %rendered.text, "compiled query");

    let mut params = rendered.params;

    if operation.uses_callbacks() {
        params
            .entry(RESOLVED_CALLBACKS.to_owned())
            .or_insert_with(|| GraphValue::Object(Vec::new()));
    }

    Ok(PendingQuery {
        text: rendered.text,
        params,
        callbacks: translator.bucket.into_pending(),
    })
}

/// [`translate`] followed by [`PendingQuery::resolve`] with the callbacks of `context`.
pub async fn compile(
    schema: &SchemaModel,
    selection: &Selection,
    context: &CompileContext,
) -> CompileResult<CompiledQuery> {
    translate(schema, selection, context)?.resolve(&context.callbacks).await
}

/// Like [`compile`], retrying with [`CreateStrategy::PerRow`] when the configured strategy
/// cannot serve the request.
pub async fn compile_with_fallback(
    schema: &SchemaModel,
    selection: &Selection,
    context: &CompileContext,
) -> CompileResult<CompiledQuery> {
    match translate(schema, selection, context) {
        Ok(pending) => pending.resolve(&context.callbacks).await,
        Err(err) if err.is_unsupported_optimization() && context.create_strategy != CreateStrategy::PerRow => {
            debug!(reason = %err, "falling back to per-row creates");

            let context = context.with_create_strategy(CreateStrategy::PerRow);
            compile(schema, selection, &context).await
        }
        Err(err) => Err(err),
    }
}
