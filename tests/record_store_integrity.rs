//! Record store integrity: round-trips, atomic uniqueness under concurrent
//! writers, monotonic timestamps, and journal-backed recovery.

use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::{json, Map, Value};

use lodestone::schema::RecordInventory;
use lodestone::store::{Cursor, RecordStore, SortSpec, StoreError};

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

fn open_with_shard(dir: &std::path::Path, unique: &[&str]) -> Arc<RecordStore> {
    let store = Arc::new(RecordStore::open(dir).unwrap());
    store.create_shard("items", 1, unique.iter().map(|s| s.to_string()).collect());
    store
}

#[test]
fn insert_then_get_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_with_shard(dir.path(), &[]);

    let payload = json!({
        "title": "round trip",
        "count": 42,
        "flag": true,
        "tags": ["a", "b"],
        "meta": {"nested": {"deep": null}},
    });
    let id = {
        let receipt = store.insert("items", 1, fields(payload.clone())).unwrap();
        receipt.record.id.clone()
    };

    let fetched = store.get("items", &id).unwrap();
    for (key, value) in payload.as_object().unwrap() {
        assert_eq!(&fetched.fields[key], value, "field '{}' changed", key);
    }
}

#[test]
fn concurrent_unique_inserts_one_success_one_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_with_shard(dir.path(), &["slug"]);

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            store
                .insert("items", 1, fields(json!({"slug": "contested"})))
                .map(|receipt| receipt.record.id.clone())
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::UniqueConflict { field }) if field == "slug"))
        .count();

    assert_eq!(successes, 1, "exactly one insert must win");
    assert_eq!(conflicts, 1, "the loser must see a uniqueness conflict");
    assert_eq!(store.record_count("items"), 1);
}

#[test]
fn updated_timestamp_is_strictly_monotonic_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_with_shard(dir.path(), &[]);

    let id = {
        let receipt = store
            .insert("items", 1, fields(json!({"n": 0})))
            .unwrap();
        receipt.record.id.clone()
    };

    let mut previous = store.get("items", &id).unwrap().updated;
    for n in 1..=5 {
        let receipt = store
            .update("items", 1, &id, fields(json!({"n": n})))
            .unwrap();
        assert!(
            receipt.record.updated > previous,
            "updated must advance on write {}",
            n
        );
        previous = receipt.record.updated;
    }
}

#[test]
fn journal_replay_reconstructs_exact_state() {
    let dir = tempfile::tempdir().unwrap();
    let (kept, edited) = {
        let store = open_with_shard(dir.path(), &[]);
        let kept = {
            let receipt = store
                .insert("items", 1, fields(json!({"title": "kept"})))
                .unwrap();
            receipt.record.id.clone()
        };
        let edited = {
            let receipt = store
                .insert("items", 1, fields(json!({"title": "before"})))
                .unwrap();
            receipt.record.id.clone()
        };
        drop(
            store
                .update("items", 1, &edited, fields(json!({"title": "after"})))
                .unwrap(),
        );
        let doomed = {
            let receipt = store
                .insert("items", 1, fields(json!({"title": "doomed"})))
                .unwrap();
            receipt.record.id.clone()
        };
        drop(store.delete("items", &doomed).unwrap());
        (kept, edited)
    };

    let store = open_with_shard(dir.path(), &[]);
    assert_eq!(store.record_count("items"), 2);
    assert_eq!(store.get("items", &kept).unwrap().fields["title"], "kept");
    assert_eq!(store.get("items", &edited).unwrap().fields["title"], "after");
}

#[test]
fn unique_index_rebuilt_after_replay() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_with_shard(dir.path(), &["slug"]);
        drop(
            store
                .insert("items", 1, fields(json!({"slug": "taken"})))
                .unwrap(),
        );
    }

    let store = open_with_shard(dir.path(), &["slug"]);
    assert_eq!(
        store
            .insert("items", 1, fields(json!({"slug": "taken"})))
            .unwrap_err(),
        StoreError::UniqueConflict { field: "slug".into() }
    );
}

#[test]
fn cursor_pagination_is_stable_under_interleaved_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_with_shard(dir.path(), &[]);

    for name in ["b", "d", "f", "h"] {
        drop(
            store
                .insert("items", 1, fields(json!({"name": name})))
                .unwrap(),
        );
    }

    let sort = SortSpec::parse("name");
    let first = store.list("items", &|_| true, &sort, None, 2).unwrap();
    let seen: Vec<&str> = first.items.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(seen, ["b", "d"]);
    let cursor = Cursor::decode(first.next_cursor.as_deref().unwrap()).unwrap();

    // Insert on both sides of the cursor between pages.
    for name in ["a", "e"] {
        drop(
            store
                .insert("items", 1, fields(json!({"name": name})))
                .unwrap(),
        );
    }

    let second = store
        .list("items", &|_| true, &sort, Some(&cursor), 10)
        .unwrap();
    let seen: Vec<&str> = second.items.iter().map(|r| r["name"].as_str().unwrap()).collect();
    // Nothing repeats, nothing before the cursor leaks in; the new "e"
    // correctly appears because it sorts after the cursor position.
    assert_eq!(seen, ["e", "f", "h"]);
}

#[test]
fn deleted_record_id_is_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_with_shard(dir.path(), &[]);

    let id = {
        let receipt = store
            .insert("items", 1, fields(json!({"n": 1})))
            .unwrap();
        receipt.record.id.clone()
    };
    drop(store.delete("items", &id).unwrap());

    // Ids are 15 chars of 36-symbol alphabet; fresh inserts never reuse a
    // previously assigned id in practice, and the store never reassigns one
    // deliberately.
    for _ in 0..32 {
        let receipt = store.insert("items", 1, fields(json!({"n": 2}))).unwrap();
        assert_ne!(receipt.record.id, id);
    }
}
