use arbordb::test_utils::test_database;
use arbordb::{event_callback, DataSnapshot, EventCallback, EventKind, PathKey, Value};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Callback that records every snapshot it receives.
fn recorder() -> (EventCallback, Arc<Mutex<Vec<DataSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback = event_callback(move |snap: &DataSnapshot| {
        sink.lock().unwrap().push(snap.clone());
    });
    (callback, seen)
}

fn keys(seen: &Arc<Mutex<Vec<DataSnapshot>>>) -> Vec<PathKey> {
    seen.lock().unwrap().iter().map(|s| s.key()).collect()
}

#[tokio::test]
async fn test_value_subscription_replays_current_value() {
    let (db, _backend) = test_database();
    let node = db.reference("data");
    node.set(Value::from(json!({"a": 1, "b": 2}))).await.unwrap();

    let (callback, seen) = recorder();
    node.on(EventKind::Value, Some(callback)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].val(), &Value::from(json!({"a": 1, "b": 2})));
}

#[tokio::test]
async fn test_value_subscription_sees_descendant_writes() {
    let (db, _backend) = test_database();
    let node = db.reference("data");
    node.set(Value::from(json!({"a": 1}))).await.unwrap();

    let (callback, seen) = recorder();
    node.on(EventKind::Value, Some(callback)).await.unwrap();
    node.child("b").set(Value::from(2)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].val(), &Value::from(json!({"a": 1, "b": 2})));
    assert_eq!(seen[1].previous(), Some(&Value::from(json!({"a": 1}))));
}

#[tokio::test]
async fn test_child_added_replays_existing_children() {
    let (db, _backend) = test_database();
    let list = db.reference("list");
    list.set(Value::from(json!({"k1": "one", "k2": "two"}))).await.unwrap();

    let (callback, seen) = recorder();
    list.on(EventKind::ChildAdded, Some(callback)).await.unwrap();
    assert_eq!(keys(&seen), vec![PathKey::from("k1"), PathKey::from("k2")]);

    list.child("k3").set(Value::from("three")).await.unwrap();
    assert_eq!(
        keys(&seen),
        vec![PathKey::from("k1"), PathKey::from("k2"), PathKey::from("k3")]
    );
    assert_eq!(seen.lock().unwrap()[2].reference().path(), "list/k3");
}

#[tokio::test]
async fn test_child_changed_and_removed() {
    let (db, _backend) = test_database();
    let list = db.reference("list");
    list.set(Value::from(json!({"k1": 1, "k2": 2}))).await.unwrap();

    let (changed_cb, changed) = recorder();
    let (removed_cb, removed) = recorder();
    list.on(EventKind::ChildChanged, Some(changed_cb)).await.unwrap();
    list.on(EventKind::ChildRemoved, Some(removed_cb)).await.unwrap();
    assert!(changed.lock().unwrap().is_empty());

    list.child("k1").set(Value::from(10)).await.unwrap();
    list.child("k2").remove().await.unwrap();

    let changed = changed.lock().unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].val(), &Value::from(10));
    assert_eq!(changed[0].previous(), Some(&Value::from(1)));

    let removed = removed.lock().unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].key(), PathKey::from("k2"));
    assert_eq!(removed[0].val(), &Value::from(2));
}

#[tokio::test]
async fn test_off_with_callback_removes_only_that_registration() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    let (first_cb, first) = recorder();
    let (second_cb, second) = recorder();
    node.on(EventKind::Value, Some(first_cb.clone())).await.unwrap();
    node.on(EventKind::Value, Some(second_cb)).await.unwrap();
    assert_eq!(backend.subscription_count("data"), 2);

    node.off(Some(EventKind::Value), Some(&first_cb)).unwrap();
    assert_eq!(backend.subscription_count("data"), 1);

    node.set(Value::from(5)).await.unwrap();
    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_off_with_unknown_callback_is_a_no_op() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    let (cb, _) = recorder();
    let (stranger, _) = recorder();
    node.on(EventKind::Value, Some(cb)).await.unwrap();

    assert!(node.off(None, Some(&stranger)).is_ok());
    assert_eq!(backend.subscription_count("data"), 1);
    assert_eq!(node.registration_count(), 1);
}

#[tokio::test]
async fn test_off_without_callback_removes_all_for_event() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    let (a, _) = recorder();
    let (b, _) = recorder();
    let (c, _) = recorder();
    node.on(EventKind::Value, Some(a)).await.unwrap();
    node.on(EventKind::Value, Some(b)).await.unwrap();
    node.on(EventKind::ChildAdded, Some(c)).await.unwrap();

    node.off(Some(EventKind::Value), None).unwrap();
    assert_eq!(backend.subscription_count("data"), 1);

    node.off(None, None).unwrap();
    assert_eq!(backend.subscription_count("data"), 0);
    assert_eq!(node.registration_count(), 0);
}

#[tokio::test]
async fn test_delivery_error_keeps_subscription() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    let (cb, seen) = recorder();
    node.on(EventKind::Value, Some(cb)).await.unwrap();

    backend.emit_error("data", "connection reset");
    assert_eq!(backend.subscription_count("data"), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    node.set(Value::from("still here")).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stream_without_callback() {
    let (db, backend) = test_database();
    let node = db.reference("feed");
    let stream = node.on(EventKind::ChildAdded, None).await.unwrap();
    let mut rx = stream.receiver();

    node.child("p1").set(Value::from("first")).await.unwrap();
    let snap = rx.recv().await.unwrap();
    assert_eq!(snap.key(), PathKey::from("p1"));

    // Once nobody listens any more the subscription goes away on the next event.
    drop(rx);
    node.child("p2").set(Value::from("second")).await.unwrap();
    assert_eq!(backend.subscription_count("feed"), 0);
    assert_eq!(node.registration_count(), 0);
}

#[tokio::test]
async fn test_once_value_reads_current_state() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    node.set(Value::from(7)).await.unwrap();

    let snap = node.once(EventKind::Value).await.unwrap();
    assert_eq!(snap.val(), &Value::from(7));
    assert_eq!(backend.subscription_count("data"), 0);
}

#[tokio::test]
async fn test_once_child_added_waits_for_next_child() {
    let (db, backend) = test_database();
    let node = db.reference("inbox");
    node.child("old").set(Value::from(1)).await.unwrap();

    let waiter = {
        let node = node.clone();
        tokio::spawn(async move { node.once(EventKind::ChildAdded).await })
    };
    while backend.subscription_count("inbox") == 0 {
        tokio::task::yield_now().await;
    }

    node.child("new").set(Value::from(2)).await.unwrap();
    let snap = waiter.await.unwrap().unwrap();
    assert_eq!(snap.key(), PathKey::from("new"));
    assert_eq!(backend.subscription_count("inbox"), 0);
}

#[tokio::test]
async fn test_failed_write_emits_no_event() {
    let (db, backend) = test_database();
    let node = db.reference("data");
    let (cb, seen) = recorder();

    backend.set_fail_on_write("data");
    node.on(EventKind::Value, Some(cb)).await.unwrap();
    assert!(node.set(Value::from(1)).await.is_err());
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(!seen.lock().unwrap()[0].exists());
    assert_eq!(backend.subscription_count("data"), 1);
}
