#![allow(unused_crate_dependencies)]

use std::sync::Arc;

use fragment_list_cache::{CacheKey, ConnectionRecord, InMemoryStore, ListCache, Operation, Store};
use serde_json::{json, Map, Value};

fn setup() -> (ListCache, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let cache = ListCache::builder(store.clone())
        .with_declaration("fragment TaskFields on Task { id title }")
        .build()
        .unwrap();

    let Value::Object(data) = json!({"items": [
        {"id": "1", "__typename": "Task", "title": "a"},
        {"id": "2", "__typename": "Task", "title": "b"}
    ]}) else {
        unreachable!()
    };

    store.write_response(&data);
    cache.reconcile(&Operation::new("{ items { id title } }"), &data).unwrap();

    (cache, store)
}

fn stored(store: &InMemoryStore) -> ConnectionRecord {
    serde_json::from_value(store.read_field("allTask").unwrap().unwrap()).unwrap()
}

fn ids(record: &ConnectionRecord) -> Vec<&str> {
    record.nodes().iter().map(|node| node.id()).collect()
}

#[test]
fn removing_a_listed_entity() {
    let (cache, store) = setup();

    assert!(cache.remove("Task", ["1"]).unwrap());

    let record = stored(&store);
    assert_eq!(ids(&record), ["2"]);
    assert_eq!(record.total_count(), 1);

    assert_eq!(store.entity(&CacheKey::from("Task:1")), None);
    assert!(store.entity(&CacheKey::from("Task:2")).is_some());

    let list = cache.read_list("Task").unwrap();
    assert_eq!(list.total_count(), 1);
    assert_eq!(list.nodes()[0].get("title"), Some(&json!("b")));
}

#[test]
fn removing_an_absent_id_still_succeeds() {
    let (cache, store) = setup();
    store.write_entity(CacheKey::from("Task:9"), Map::new());

    assert!(cache.remove("Task", ["9"]).unwrap());

    let record = stored(&store);
    assert_eq!(ids(&record), ["1", "2"]);
    assert_eq!(record.total_count(), 2);

    // Eviction does not depend on the id being listed.
    assert_eq!(store.entity(&CacheKey::from("Task:9")), None);
}

#[test]
fn nothing_to_remove_from() {
    let store = Arc::new(InMemoryStore::new());
    let cache = ListCache::builder(store.clone())
        .with_declaration("fragment TaskFields on Task { id }")
        .build()
        .unwrap();
    store.write_entity(CacheKey::from("Task:1"), Map::new());

    assert!(!cache.remove("Task", ["1"]).unwrap());
    assert!(store.entity(&CacheKey::from("Task:1")).is_some());
    assert!(store.read_field("allTask").unwrap().is_none());
}

#[test]
fn removed_entities_can_be_listed_again() {
    let (cache, store) = setup();

    cache.remove("Task", ["1", "2"]).unwrap();
    assert_eq!(stored(&store).total_count(), 0);

    let Value::Object(data) = json!({"task": {"id": "1", "__typename": "Task", "title": "again"}}) else {
        unreachable!()
    };
    store.write_response(&data);
    cache.reconcile(&Operation::new("{ task { id title } }"), &data).unwrap();

    assert_eq!(ids(&stored(&store)), ["1"]);
}

#[test]
fn listed_entities_are_evicted_under_their_stored_key() {
    let store = Arc::new(InMemoryStore::with_identify(|object| {
        object.get("uuid").and_then(Value::as_str).map(CacheKey::from)
    }));
    let cache = ListCache::builder(store.clone())
        .with_declaration("fragment TaskFields on Task { id title }")
        .build()
        .unwrap();

    let Value::Object(data) = json!({"items": [
        {"id": "1", "uuid": "u-1", "__typename": "Task", "title": "a"},
        {"id": "2", "uuid": "u-2", "__typename": "Task", "title": "b"}
    ]}) else {
        unreachable!()
    };
    store.write_response(&data);
    cache.reconcile(&Operation::new("{ items { id uuid title } }"), &data).unwrap();

    assert!(cache.remove("Task", ["1"]).unwrap());

    assert_eq!(ids(&stored(&store)), ["2"]);
    assert_eq!(store.entity(&CacheKey::from("u-1")), None);
    assert!(store.entity(&CacheKey::from("u-2")).is_some());
}
