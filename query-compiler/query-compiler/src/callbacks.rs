//! Values computed outside the query, such as generated identifiers.
//!
//! Compilation happens in two phases. While the query is assembled, every field populated by
//! a callback registers a [`PendingCallback`] in the [`CallbackBucket`] and references a
//! parameter slot instead of a value. Once the text is rendered, [`CallbackBucket::resolve`]
//! runs the callbacks in registration order and writes their results into those slots.

use std::{cell::RefCell, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use graph_value::GraphValue;
use indexmap::IndexMap;

use crate::{CompileError, CompileResult};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type CallbackResult = Result<GraphValue, BoxError>;

/// A named value producer supplied by the caller.
///
/// Receives the input object of the node being written.
pub trait Callback: Send + Sync {
    fn call(&self, parent: GraphValue) -> BoxFuture<'static, CallbackResult>;
}

impl<F, Fut> Callback for F
where
    F: Fn(GraphValue) -> Fut + Send + Sync,
    Fut: Future<Output = CallbackResult> + Send + 'static,
{
    fn call(&self, parent: GraphValue) -> BoxFuture<'static, CallbackResult> {
        Box::pin((self)(parent))
    }
}

/// Callbacks by the name the schema refers to them with.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: IndexMap<String, Arc<dyn Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, callback: impl Callback + 'static) -> Self {
        self.callbacks.insert(name.into(), Arc::new(callback));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Callback>> {
        self.callbacks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.callbacks.keys()).finish()
    }
}

/// A step on the way from the parameter map to a callback slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        PathSegment::Index(idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCallback {
    pub callback: String,
    pub parent: GraphValue,
    /// Where the result goes, starting with the parameter name.
    pub target: Vec<PathSegment>,
}

/// Compile scoped registry of pending callbacks.
#[derive(Debug, Default)]
pub struct CallbackBucket {
    pending: RefCell<Vec<PendingCallback>>,
}

impl CallbackBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, callback: impl Into<String>, parent: GraphValue, target: Vec<PathSegment>) {
        self.pending.borrow_mut().push(PendingCallback {
            callback: callback.into(),
            parent,
            target,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_pending(self) -> Vec<PendingCallback> {
        self.pending.into_inner()
    }

    /// Runs every pending callback once, in registration order, and stores the results.
    pub async fn resolve(
        pending: Vec<PendingCallback>,
        registry: &CallbackRegistry,
        params: &mut IndexMap<String, GraphValue>,
    ) -> CompileResult<()> {
        for PendingCallback {
            callback,
            parent,
            target,
        } in pending
        {
            let producer = registry.get(&callback).ok_or_else(|| CompileError::Callback {
                name: callback.clone(),
                message: "no callback registered under this name".into(),
            })?;

            let value = producer.call(parent).await.map_err(|err| CompileError::Callback {
                name: callback.clone(),
                message: err.to_string(),
            })?;

            tracing::debug!(callback = %callback, "resolved callback");

            store(params, &target, value).map_err(|message| CompileError::Callback {
                name: callback.clone(),
                message,
            })?;
        }

        Ok(())
    }
}

fn store(params: &mut IndexMap<String, GraphValue>, target: &[PathSegment], value: GraphValue) -> Result<(), String> {
    let Some((PathSegment::Key(param), rest)) = target.split_first() else {
        return Err("callback target does not start with a parameter".into());
    };

    let slot = params
        .entry(param.clone())
        .or_insert_with(|| GraphValue::Object(Vec::new()));

    store_in(slot, rest, value)
}

fn store_in(slot: &mut GraphValue, path: &[PathSegment], value: GraphValue) -> Result<(), String> {
    let Some((segment, rest)) = path.split_first() else {
        *slot = value;
        return Ok(());
    };

    match (slot, segment) {
        (GraphValue::Object(entries), PathSegment::Key(key)) => {
            let idx = match entries.iter().position(|(k, _)| k == key) {
                Some(idx) => idx,
                None => {
                    entries.push((key.clone(), GraphValue::Null));
                    entries.len() - 1
                }
            };

            store_in(&mut entries[idx].1, rest, value)
        }
        (GraphValue::List(items), PathSegment::Index(idx)) => match items.get_mut(*idx) {
            Some(item) => store_in(item, rest, value),
            None => Err(format!("index {idx} out of bounds")),
        },
        (slot @ GraphValue::Null, PathSegment::Key(key)) => {
            *slot = GraphValue::Object(vec![(key.clone(), GraphValue::Null)]);
            store_in(slot, path, value)
        }
        (_, segment) => Err(format!("cannot store a value at {segment:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_resolve_in_registration_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new().register("sequence", {
            let counter = counter.clone();
            move |_parent| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(GraphValue::from(n)) }
            }
        });

        let bucket = CallbackBucket::new();
        bucket.add("sequence", GraphValue::Null, vec!["resolvedCallbacks".into(), "b".into()]);
        bucket.add("sequence", GraphValue::Null, vec!["resolvedCallbacks".into(), "a".into()]);

        let mut params = IndexMap::new();
        params.insert("resolvedCallbacks".to_owned(), GraphValue::Object(vec![]));

        block_on(CallbackBucket::resolve(bucket.into_pending(), &registry, &mut params)).unwrap();

        assert_eq!(
            params["resolvedCallbacks"],
            GraphValue::Object(vec![("b".into(), 0usize.into()), ("a".into(), 1usize.into())])
        );
    }

    #[test]
    fn results_land_inside_list_parameters() {
        let registry = CallbackRegistry::new().register("id", |parent: GraphValue| async move {
            let title = parent.get("title").and_then(GraphValue::as_str).unwrap_or_default().to_owned();
            Ok(GraphValue::from(format!("id-{title}")))
        });

        let rows: GraphValue = r#"[{ "title": "A" }, { "title": "B" }]"#.parse().unwrap();
        let bucket = CallbackBucket::new();
        bucket.add("id", rows.as_list().unwrap()[1].clone(), vec!["rows".into(), 1.into(), "id".into()]);

        let mut params = IndexMap::new();
        params.insert("rows".to_owned(), rows);

        block_on(CallbackBucket::resolve(bucket.into_pending(), &registry, &mut params)).unwrap();

        assert_eq!(params["rows"].get_path_index(1, "id"), Some(&GraphValue::from("id-B")));
    }

    #[test]
    fn unknown_callbacks_fail_resolution() {
        let bucket = CallbackBucket::new();
        bucket.add("missing", GraphValue::Null, vec!["resolvedCallbacks".into(), "x".into()]);

        let err = block_on(CallbackBucket::resolve(
            bucket.into_pending(),
            &CallbackRegistry::new(),
            &mut IndexMap::new(),
        ))
        .unwrap_err();

        assert!(matches!(err, CompileError::Callback { name, .. } if name == "missing"));
    }

    trait IndexPath {
        fn get_path_index(&self, idx: usize, key: &str) -> Option<&GraphValue>;
    }

    impl IndexPath for GraphValue {
        fn get_path_index(&self, idx: usize, key: &str) -> Option<&GraphValue> {
            self.as_list()?.get(idx)?.get(key)
        }
    }
}
