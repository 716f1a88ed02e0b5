//! Change events published after mutations, and the per-subscriber view of them.
//!
//! Deciding whether an event reaches a subscriber never touches the database: the `where`
//! argument is evaluated against the property maps carried by the event itself.

use std::{fmt, str::FromStr};

use futures::Stream;
use graph_value::GraphValue;
use schema_model::{AuthOperation, Filter, NodeDescriptor, SchemaModel, WriteOperation};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    CompileContext, CompileError, CompileResult,
    translate::{check_rule, extract_node_filter},
};

/// Relationship events are published but not delivered to subscribers yet.
const RELATIONSHIP_EVENTS_ENABLED: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Create => "create",
            SubscriptionKind::Update => "update",
            SubscriptionKind::Delete => "delete",
            SubscriptionKind::Connect => "connect",
            SubscriptionKind::Disconnect => "disconnect",
        }
    }

    fn is_relationship(&self) -> bool {
        matches!(self, SubscriptionKind::Connect | SubscriptionKind::Disconnect)
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionKind {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(SubscriptionKind::Create),
            "update" => Ok(SubscriptionKind::Update),
            "delete" => Ok(SubscriptionKind::Delete),
            "connect" => Ok(SubscriptionKind::Connect),
            "disconnect" => Ok(SubscriptionKind::Disconnect),
            other => Err(CompileError::invalid_argument("event", format!("unknown subscription event `{other}`"))),
        }
    }
}

/// Property maps before and after the change. `old` is null for creates, `new` for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    pub old: GraphValue,
    pub new: GraphValue,
}

/// The payload of the `meta` list returned next to `data` by mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvent {
    pub id: i64,
    pub typename: String,
    pub properties: NodeProperties,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipProperties {
    pub from: GraphValue,
    pub to: GraphValue,
    pub relationship: GraphValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEvent {
    pub id: i64,
    pub relationship_name: String,
    pub from_typename: String,
    pub to_typename: String,
    pub properties: RelationshipProperties,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SubscriptionEvent {
    Create(NodeEvent),
    Update(NodeEvent),
    Delete(NodeEvent),
    Connect(RelationshipEvent),
    Disconnect(RelationshipEvent),
}

impl SubscriptionEvent {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            SubscriptionEvent::Create(_) => SubscriptionKind::Create,
            SubscriptionEvent::Update(_) => SubscriptionKind::Update,
            SubscriptionEvent::Delete(_) => SubscriptionKind::Delete,
            SubscriptionEvent::Connect(_) => SubscriptionKind::Connect,
            SubscriptionEvent::Disconnect(_) => SubscriptionKind::Disconnect,
        }
    }
}

/// Decides which events one subscriber receives.
#[derive(Debug, Clone)]
pub struct SubscriptionFilter {
    typename: String,
    kind: SubscriptionKind,
    filter: Filter,
    relationship_types: Vec<String>,
    /// Properties whose change alone does not make an update worth delivering.
    masked: Vec<String>,
}

impl SubscriptionFilter {
    /// Builds the filter of a `<node><Kind>d(where)` subscription.
    ///
    /// Fails when the request may not subscribe to `node`, or when `where` needs the graph to
    /// be decided.
    pub fn new(
        schema: &SchemaModel,
        node: &NodeDescriptor,
        kind: SubscriptionKind,
        where_arg: Option<&GraphValue>,
        context: &CompileContext,
    ) -> CompileResult<Self> {
        for rule in node.auth_rules(AuthOperation::Subscribe) {
            check_rule(rule, context)?;
        }

        let filter = match where_arg.filter(|v| !v.is_null()) {
            Some(value) => extract_node_filter(schema, node, value)?,
            None => Filter::Empty,
        };

        if filter.requires_traversal() {
            return Err(CompileError::invalid_argument(
                "where",
                "subscriptions can only filter on properties of the node",
            ));
        }

        let masked = node
            .fields
            .iter()
            .filter(|f| f.timestamps.contains(&WriteOperation::Update))
            .map(|f| f.db_name().to_owned())
            .collect();

        Ok(SubscriptionFilter {
            typename: node.name.clone(),
            kind,
            filter,
            relationship_types: node.relation_fields.iter().map(|r| r.relationship_type.clone()).collect(),
            masked,
        })
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn matches(&self, event: &SubscriptionEvent) -> bool {
        if event.kind() != self.kind {
            return false;
        }

        match event {
            SubscriptionEvent::Create(e) => self.matches_node(e, &e.properties.new),
            SubscriptionEvent::Update(e) => self.matches_node(e, &e.properties.old) && self.has_changes(&e.properties),
            SubscriptionEvent::Delete(e) => self.matches_node(e, &e.properties.old),
            SubscriptionEvent::Connect(e) | SubscriptionEvent::Disconnect(e) => self.matches_relationship(e),
        }
    }

    fn matches_node(&self, event: &NodeEvent, properties: &GraphValue) -> bool {
        event.typename == self.typename && self.filter.evaluate(properties)
    }

    fn has_changes(&self, properties: &NodeProperties) -> bool {
        let unmasked = |value: &GraphValue| -> Vec<(String, GraphValue)> {
            value
                .as_object()
                .unwrap_or_default()
                .iter()
                .filter(|(key, _)| !self.masked.contains(key))
                .cloned()
                .collect()
        };

        let old = unmasked(&properties.old);
        let new = unmasked(&properties.new);

        old.len() != new.len() || old.iter().any(|(key, value)| !new.iter().any(|(k, v)| k == key && v == value))
    }

    fn matches_relationship(&self, event: &RelationshipEvent) -> bool {
        if !RELATIONSHIP_EVENTS_ENABLED || !self.kind.is_relationship() {
            return false;
        }

        let endpoint = if event.to_typename == self.typename {
            &event.properties.to
        } else if event.from_typename == self.typename {
            &event.properties.from
        } else {
            return false;
        };

        self.relationship_types.contains(&event.relationship_name) && self.filter.evaluate(endpoint)
    }
}

/// One subscriber's view of the event channel.
pub struct Subscription {
    receiver: broadcast::Receiver<SubscriptionEvent>,
    filter: SubscriptionFilter,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        receiver: broadcast::Receiver<SubscriptionEvent>,
        filter: SubscriptionFilter,
        cancel: CancellationToken,
    ) -> Self {
        Subscription {
            receiver,
            filter,
            cancel,
        }
    }

    /// The next matching event, or `None` once cancelled or once every sender is gone.
    ///
    /// Events dropped because this subscriber fell behind are skipped.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, kind = %self.filter.kind(), "subscriber lagged behind, events were dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SubscriptionEvent> {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.next().await?;
            Some((event, subscription))
        })
    }
}
