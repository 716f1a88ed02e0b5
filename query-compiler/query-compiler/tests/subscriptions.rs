mod common;

use common::*;
use pretty_assertions::assert_eq;
use query_compiler::{CompileContext, Subscription, SubscriptionEvent, SubscriptionFilter, SubscriptionKind};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

fn updated(old: serde_json::Value, new: serde_json::Value) -> SubscriptionEvent {
    serde_json::from_value(json!({
        "event": "update",
        "id": 3,
        "typename": "Movie",
        "properties": { "old": old, "new": new },
        "timestamp": 1700000000000i64
    }))
    .unwrap()
}

#[tokio::test]
async fn subscribers_only_see_matching_changes() {
    let schema = schema();
    let movie = schema.find_node("Movie").unwrap();
    let where_arg = value(json!({ "released_LT": 2000 }));

    let filter = SubscriptionFilter::new(
        &schema,
        movie,
        SubscriptionKind::Update,
        Some(&where_arg),
        &CompileContext::default(),
    )
    .unwrap();

    let (sender, receiver) = broadcast::channel(8);
    let cancel = CancellationToken::new();
    let mut subscription = Subscription::new(receiver, filter, cancel.clone());

    let unchanged = updated(json!({ "title": "Heat", "released": 1995 }), json!({ "title": "Heat", "released": 1995 }));
    let recent = updated(json!({ "title": "Tenet", "released": 2020 }), json!({ "title": "Tenet!", "released": 2020 }));
    let renamed = updated(json!({ "title": "Heat", "released": 1995 }), json!({ "title": "HEAT", "released": 1995 }));

    for event in [unchanged, recent, renamed.clone()] {
        sender.send(event).unwrap();
    }

    assert_eq!(subscription.next().await, Some(renamed));

    drop(sender);
    assert_eq!(subscription.next().await, None);
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn cancelling_ends_a_waiting_subscriber() {
    let schema = schema();
    let movie = schema.find_node("Movie").unwrap();
    let filter =
        SubscriptionFilter::new(&schema, movie, SubscriptionKind::Create, None, &CompileContext::default()).unwrap();

    let (_sender, receiver) = broadcast::channel(8);
    let cancel = CancellationToken::new();
    let mut subscription = Subscription::new(receiver, filter, cancel.clone());

    let waiting = tokio::spawn(async move { subscription.next().await });
    cancel.cancel();

    assert_eq!(waiting.await.unwrap(), None);
}
