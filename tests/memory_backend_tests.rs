use arbordb::config::Config;
use arbordb::storage::memory::MemoryBackend;
use arbordb::storage::{create_backend, transaction_updater, Backend, EventHandler, GetOptions};
use arbordb::test_utils::get_test_config;
use arbordb::transport::{deserialize, serialize, Envelope};
use arbordb::{ArborError, EventKind, Value};
use assert_matches::assert_matches;
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn env(v: serde_json::Value) -> Envelope {
    serialize(&Value::from(v))
}

async fn read(backend: &dyn Backend, path: &str) -> Value {
    deserialize(backend.get(path, &GetOptions::default()).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_create_backend_from_config() {
    let backend = create_backend(get_test_config()).unwrap();
    backend.set("a/b", env(json!(1))).await.unwrap();
    assert!(backend.exists("a").await.unwrap());
    assert_eq!(read(backend.as_ref(), "a").await, Value::from(json!({"b": 1})));
}

#[tokio::test]
async fn test_fail_on_write_and_clear() {
    let backend = MemoryBackend::new();
    backend.set_fail_on_write("frozen");

    let res = backend.set("frozen/x", env(json!(true))).await;
    assert_matches!(res, Err(ArborError::Backend(_)));
    // Siblings stay writable.
    backend.set("thawed/x", env(json!(true))).await.unwrap();

    backend.clear_fail_on_write();
    backend.set("frozen/x", env(json!(true))).await.unwrap();
    assert!(!backend.is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_to_distinct_children() {
    let backend = MemoryBackend::new();
    let writes = (0..20).map(|i| {
        let backend = backend.clone();
        async move { backend.set(&format!("items/i{:02}", i), env(json!(i))).await }
    });
    for res in join_all(writes).await {
        res.unwrap();
    }
    match read(&backend, "items").await {
        Value::Object(items) => assert_eq!(items.len(), 20),
        other => panic!("expected object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_handler_may_unsubscribe_itself() {
    let backend = MemoryBackend::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

    let handler = {
        let backend = backend.clone();
        let calls = calls.clone();
        let slot = slot.clone();
        EventHandler::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot.lock().unwrap().take() {
                backend.unsubscribe("n", EventKind::Value, Some(&me)).unwrap();
            }
        })
    };
    *slot.lock().unwrap() = Some(handler.clone());
    backend.subscribe("n", EventKind::Value, handler).unwrap();

    backend.set("n", env(json!(1))).await.unwrap();
    backend.set("n", env(json!(2))).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.subscription_count("n"), 0);
}

#[tokio::test]
async fn test_transaction_gives_up_after_retries() {
    let mut config = Config::default();
    config.storage.max_transaction_retries = 2;
    let backend = MemoryBackend::with_config(&config.storage);
    let attempts = Arc::new(AtomicUsize::new(0));

    // Every attempt races with a competing write, so no attempt can commit.
    let updater = {
        let backend = backend.clone();
        let attempts = attempts.clone();
        transaction_updater(move |current: Envelope| {
            let backend = backend.clone();
            let n = attempts.fetch_add(1, Ordering::SeqCst) as i64;
            async move {
                backend.set("counter", env(json!(1000 + n))).await?;
                let value = deserialize(current)?.as_i64().unwrap_or(0);
                Ok(Some(env(json!(value + 1))))
            }
        })
    };
    let result = backend.transaction("counter", updater).await;
    assert_matches!(result, Err(ArborError::Backend(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}
