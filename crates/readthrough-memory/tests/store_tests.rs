use std::sync::Arc;
use std::time::Duration;

use readthrough_core::{CacheRecord, Storage};
use readthrough_memory::{MemoryStore, MemoryStoreConfig};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Todo {
    id: u32,
    title: String,
    done: bool,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_distinct_keys() {
    let store = Arc::new(MemoryStore::with_defaults());
    let ttl = Duration::from_secs(60);

    let handles: Vec<_> = (0..64u32)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let key = format!("todo:{}", i);
                let todo = Todo {
                    id: i,
                    title: format!("task {}", i),
                    done: i % 2 == 0,
                };
                store
                    .set(&key, CacheRecord::new(todo, Duration::from_secs(30)), ttl)
                    .await
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..64u32 {
        let record = store
            .get::<Todo>(&format!("todo:{}", i))
            .await
            .unwrap()
            .expect("every key was written");
        assert_eq!(record.value().id, i);
        assert_eq!(record.value().title, format!("task {}", i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_records_during_overwrites() {
    let store = Arc::new(MemoryStore::with_defaults());
    let ttl = Duration::from_secs(60);

    store
        .set(
            "todo:1",
            CacheRecord::new(
                Todo {
                    id: 0,
                    title: "v0".to_string(),
                    done: false,
                },
                Duration::from_secs(30),
            ),
            ttl,
        )
        .await
        .unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for version in 1..200u32 {
                let todo = Todo {
                    id: version,
                    title: format!("v{}", version),
                    done: false,
                };
                store
                    .set("todo:1", CacheRecord::new(todo, Duration::from_secs(30)), ttl)
                    .await
                    .unwrap();
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..200 {
                let record = store.get::<Todo>("todo:1").await.unwrap().unwrap();
                // id and title are always written together
                assert_eq!(record.value().title, format!("v{}", record.value().id));
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn test_expiry_is_counted() {
    let store = MemoryStore::new(MemoryStoreConfig { max_capacity: 100 });

    store
        .set("k", CacheRecord::new(1u32, Duration::from_millis(10)), Duration::from_millis(30))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    store.run_pending_tasks().await;

    assert!(store.get::<u32>("k").await.unwrap().is_none());
    assert_eq!(store.entry_count(), 0);
    assert_eq!(store.metrics().expirations(), 1);
}

#[test]
fn test_serialized_record_keeps_refresh_threshold() {
    let record = CacheRecord::new(
        Todo {
            id: 9,
            title: "ship".to_string(),
            done: false,
        },
        Duration::from_secs(120),
    );

    let bytes = serde_json::to_vec(&record).unwrap();
    let decoded: CacheRecord<Todo> = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(decoded.value(), record.value());
    assert!(decoded.is_fresh());
    let left = decoded.time_until_refresh().unwrap();
    assert!(left > Duration::from_secs(118) && left <= Duration::from_secs(120));
}

#[test]
fn test_serialized_past_threshold_decodes_stale() {
    let json = r#"{"value":{"id":1,"title":"old","done":true},"refresh_at_unix_ms":1000}"#;

    let decoded: CacheRecord<Todo> = serde_json::from_str(json).unwrap();

    assert!(decoded.is_stale());
    assert_eq!(decoded.value().title, "old");
}
