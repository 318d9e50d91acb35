//! # Store Core
//!
//! Shard-per-collection record authority. The outer map is only touched when
//! collections are created or dropped; record operations share one shard and
//! never contend across collections.
//!
//! Mutation critical section, in order: schema-version compare, uniqueness
//! checks, journal append, in-memory apply, publish-permit acquisition. A
//! failure before the journal append leaves no trace; the journal append is
//! the commit point.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use parking_lot::{ArcMutexGuard, Mutex as PermitMutex, RawMutex};
use serde_json::{Map, Value};

use crate::schema::RecordInventory;

use super::cursor::{Cursor, SortSpec};
use super::errors::{StoreError, StoreResult};
use super::journal::{replay, JournalEntry, JournalWriter};
use super::record::Record;

/// A committed mutation: the stored record, its per-collection commit
/// sequence number, and the publish permit. Event order equals commit order
/// as long as the caller publishes before dropping the receipt.
pub struct CommitReceipt {
    /// The record as committed (pre-delete state for deletes)
    pub record: Record,
    /// Per-collection commit sequence number
    pub seq: u64,
    _permit: ArcMutexGuard<RawMutex, ()>,
}

impl std::fmt::Debug for CommitReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitReceipt")
            .field("record", &self.record)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Flattened record JSONs, in sort order
    pub items: Vec<Value>,
    /// Cursor for the next page, absent on the last page
    pub next_cursor: Option<String>,
}

struct Shard {
    data: RwLock<ShardData>,
    permit: Arc<PermitMutex<()>>,
}

impl Shard {
    fn new(schema_version: u64) -> Self {
        Self {
            data: RwLock::new(ShardData {
                schema_version,
                records: HashMap::new(),
                unique: HashMap::new(),
                commit_seq: 0,
            }),
            permit: Arc::new(PermitMutex::new(())),
        }
    }
}

struct ShardData {
    schema_version: u64,
    records: HashMap<String, Record>,
    /// field -> canonical value -> record id
    unique: HashMap<String, HashMap<String, String>>,
    commit_seq: u64,
}

impl ShardData {
    fn unique_conflict(&self, field: &str, key: &str, exclude_id: Option<&str>) -> bool {
        self.unique
            .get(field)
            .and_then(|index| index.get(key))
            .map(|holder| Some(holder.as_str()) != exclude_id)
            .unwrap_or(false)
    }

    fn index_record(&mut self, record: &Record) {
        for (field, index) in self.unique.iter_mut() {
            if let Some(value) = record.fields.get(field) {
                if !value.is_null() {
                    index.insert(crate::schema::canonical_key(value), record.id.clone());
                }
            }
        }
    }

    fn unindex_record(&mut self, record: &Record) {
        for (field, index) in self.unique.iter_mut() {
            if let Some(value) = record.fields.get(field) {
                if !value.is_null() {
                    index.remove(&crate::schema::canonical_key(value));
                }
            }
        }
    }

    fn rebuild_unique(&mut self, unique_fields: Vec<String>) {
        self.unique = unique_fields
            .into_iter()
            .map(|field| (field, HashMap::new()))
            .collect();
        let records: Vec<Record> = self.records.values().cloned().collect();
        for record in &records {
            self.index_record(record);
        }
    }
}

/// The record store.
pub struct RecordStore {
    shards: RwLock<HashMap<String, Arc<Shard>>>,
    journal: Mutex<JournalWriter>,
}

impl RecordStore {
    /// Open the store: replay the journal and rebuild every shard's records.
    /// Unique indexes and schema versions are installed afterwards by the
    /// schema registry through the inventory seam.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let entries = replay(data_dir)?;
        let journal = JournalWriter::open(data_dir)?;

        let mut shards: HashMap<String, Arc<Shard>> = HashMap::new();
        for entry in entries {
            match entry {
                JournalEntry::Insert { collection, record }
                | JournalEntry::Update { collection, record } => {
                    let shard = shards
                        .entry(collection)
                        .or_insert_with(|| Arc::new(Shard::new(0)));
                    let mut data = shard.data.write().expect("shard lock poisoned");
                    data.records.insert(record.id.clone(), record);
                }
                JournalEntry::Delete { collection, id } => {
                    if let Some(shard) = shards.get(&collection) {
                        let mut data = shard.data.write().expect("shard lock poisoned");
                        data.records.remove(&id);
                    }
                }
                JournalEntry::PurgeFields { collection, fields } => {
                    if let Some(shard) = shards.get(&collection) {
                        let mut data = shard.data.write().expect("shard lock poisoned");
                        for record in data.records.values_mut() {
                            for field in &fields {
                                record.fields.remove(field);
                            }
                        }
                    }
                }
                JournalEntry::DropCollection { collection } => {
                    shards.remove(&collection);
                }
            }
        }

        Ok(Self {
            shards: RwLock::new(shards),
            journal: Mutex::new(journal),
        })
    }

    fn shard(&self, collection: &str) -> StoreResult<Arc<Shard>> {
        self.shards
            .read()
            .expect("store lock poisoned")
            .get(collection)
            .cloned()
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }

    fn append(&self, entry: &JournalEntry) -> StoreResult<()> {
        self.journal
            .lock()
            .expect("journal lock poisoned")
            .append(entry)
    }

    /// Insert a validated field map as a new record.
    pub fn insert(
        &self,
        collection: &str,
        expected_version: u64,
        fields: Map<String, Value>,
    ) -> StoreResult<CommitReceipt> {
        let shard = self.shard(collection)?;
        let mut data = shard.data.write().expect("shard lock poisoned");

        if data.schema_version != expected_version {
            return Err(StoreError::SchemaVersionConflict {
                expected: expected_version,
                actual: data.schema_version,
            });
        }

        let record = Record::new(fields);
        if data.records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }

        for (field, value) in &record.fields {
            if value.is_null() || !data.unique.contains_key(field) {
                continue;
            }
            let key = crate::schema::canonical_key(value);
            if data.unique_conflict(field, &key, None) {
                return Err(StoreError::UniqueConflict {
                    field: field.clone(),
                });
            }
        }

        self.append(&JournalEntry::Insert {
            collection: collection.to_string(),
            record: record.clone(),
        })?;

        data.index_record(&record);
        data.records.insert(record.id.clone(), record.clone());
        data.commit_seq += 1;
        let seq = data.commit_seq;

        Ok(CommitReceipt {
            record,
            seq,
            _permit: shard.permit.lock_arc(),
        })
    }

    /// Fetch one record.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let shard = self.shard(collection)?;
        let data = shard.data.read().expect("shard lock poisoned");
        data.records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    /// Whether a record exists.
    pub fn exists(&self, collection: &str, id: &str) -> bool {
        self.shard(collection)
            .map(|shard| {
                shard
                    .data
                    .read()
                    .expect("shard lock poisoned")
                    .records
                    .contains_key(id)
            })
            .unwrap_or(false)
    }

    /// Apply a partial update to a record.
    pub fn update(
        &self,
        collection: &str,
        expected_version: u64,
        id: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<CommitReceipt> {
        let shard = self.shard(collection)?;
        let mut data = shard.data.write().expect("shard lock poisoned");

        if data.schema_version != expected_version {
            return Err(StoreError::SchemaVersionConflict {
                expected: expected_version,
                actual: data.schema_version,
            });
        }

        let mut record = data
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (field, value) in &patch {
            if value.is_null() || !data.unique.contains_key(field) {
                continue;
            }
            let key = crate::schema::canonical_key(value);
            if data.unique_conflict(field, &key, Some(id)) {
                return Err(StoreError::UniqueConflict {
                    field: field.clone(),
                });
            }
        }

        let previous = record.clone();
        for (field, value) in patch {
            record.fields.insert(field, value);
        }
        record.touch();

        self.append(&JournalEntry::Update {
            collection: collection.to_string(),
            record: record.clone(),
        })?;

        data.unindex_record(&previous);
        data.index_record(&record);
        data.records.insert(record.id.clone(), record.clone());
        data.commit_seq += 1;
        let seq = data.commit_seq;

        Ok(CommitReceipt {
            record,
            seq,
            _permit: shard.permit.lock_arc(),
        })
    }

    /// Delete a record. The receipt carries the pre-delete state for event
    /// payloads.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<CommitReceipt> {
        let shard = self.shard(collection)?;
        let mut data = shard.data.write().expect("shard lock poisoned");

        let record = data
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        self.append(&JournalEntry::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        data.unindex_record(&record);
        data.records.remove(id);
        data.commit_seq += 1;
        let seq = data.commit_seq;

        Ok(CommitReceipt {
            record,
            seq,
            _permit: shard.permit.lock_arc(),
        })
    }

    /// List records matching a predicate, sorted, cursor-paginated.
    ///
    /// The snapshot is cloned out of the read lock; filtering, sorting and
    /// pagination run without holding anything exclusive.
    pub fn list(
        &self,
        collection: &str,
        predicate: &dyn Fn(&Value) -> bool,
        sort: &SortSpec,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> StoreResult<ListPage> {
        let shard = self.shard(collection)?;
        let snapshot: Vec<Value> = {
            let data = shard.data.read().expect("shard lock poisoned");
            data.records.values().map(Record::to_json).collect()
        };

        let mut matching: Vec<Value> = snapshot.into_iter().filter(|r| predicate(r)).collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        let start = match cursor {
            Some(cursor) => matching
                .iter()
                .position(|r| sort.compare_to_cursor(r, cursor).is_gt())
                .unwrap_or(matching.len()),
            None => 0,
        };

        let end = (start + limit).min(matching.len());
        let has_more = end < matching.len();
        let items: Vec<Value> = matching[start..end].to_vec();

        let next_cursor = if has_more {
            items.last().map(|last| Cursor::at(sort, last).encode())
        } else {
            None
        };

        Ok(ListPage { items, next_cursor })
    }

    /// Ids of records whose field equals the given string value. Used for
    /// relation cascade checks.
    pub fn find_by_field(&self, collection: &str, field: &str, value: &str) -> Vec<String> {
        let Ok(shard) = self.shard(collection) else {
            return Vec::new();
        };
        let data = shard.data.read().expect("shard lock poisoned");
        data.records
            .values()
            .filter(|r| r.fields.get(field).and_then(Value::as_str) == Some(value))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Current schema version of a shard.
    pub fn shard_version(&self, collection: &str) -> StoreResult<u64> {
        let shard = self.shard(collection)?;
        let data = shard.data.read().expect("shard lock poisoned");
        Ok(data.schema_version)
    }
}

impl RecordInventory for RecordStore {
    fn record_count(&self, collection: &str) -> usize {
        self.shard(collection)
            .map(|shard| {
                shard
                    .data
                    .read()
                    .expect("shard lock poisoned")
                    .records
                    .len()
            })
            .unwrap_or(0)
    }

    fn snapshot(&self, collection: &str) -> Vec<Value> {
        self.shard(collection)
            .map(|shard| {
                shard
                    .data
                    .read()
                    .expect("shard lock poisoned")
                    .records
                    .values()
                    .map(Record::to_json)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn create_shard(&self, collection: &str, version: u64, unique_fields: Vec<String>) {
        let mut shards = self.shards.write().expect("store lock poisoned");
        let shard = shards
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(Shard::new(version)))
            .clone();
        drop(shards);

        let mut data = shard.data.write().expect("shard lock poisoned");
        data.schema_version = version;
        data.rebuild_unique(unique_fields);
    }

    fn drop_shard(&self, collection: &str) {
        let mut shards = self.shards.write().expect("store lock poisoned");
        if shards.remove(collection).is_some() {
            drop(shards);
            if let Err(e) = self.append(&JournalEntry::DropCollection {
                collection: collection.to_string(),
            }) {
                crate::observability::log_stderr(
                    crate::observability::Severity::Error,
                    "store.journal_error",
                    &[("collection", collection), ("detail", &e.to_string())],
                );
            }
        }
    }

    fn apply_alteration(
        &self,
        collection: &str,
        removed_fields: &[String],
        unique_fields: Vec<String>,
        new_version: u64,
    ) {
        let Ok(shard) = self.shard(collection) else {
            return;
        };
        let mut data = shard.data.write().expect("shard lock poisoned");

        if !removed_fields.is_empty() {
            if let Err(e) = self.append(&JournalEntry::PurgeFields {
                collection: collection.to_string(),
                fields: removed_fields.to_vec(),
            }) {
                crate::observability::log_stderr(
                    crate::observability::Severity::Error,
                    "store.journal_error",
                    &[("collection", collection), ("detail", &e.to_string())],
                );
            }
            for record in data.records.values_mut() {
                for field in removed_fields {
                    record.fields.remove(field);
                }
            }
        }

        data.rebuild_unique(unique_fields);
        data.schema_version = new_version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn open_store() -> (RecordStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        store.create_shard("posts", 1, vec!["slug".to_string()]);
        (store, dir)
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let (store, _dir) = open_store();
        let receipt = store
            .insert("posts", 1, fields(json!({"title": "hello", "slug": "hello"})))
            .unwrap();
        let id = receipt.record.id.clone();
        drop(receipt);

        let fetched = store.get("posts", &id).unwrap();
        assert_eq!(fetched.fields["title"], "hello");
        assert_eq!(fetched.created, fetched.updated);
    }

    #[test]
    fn test_insert_unknown_collection() {
        let (store, _dir) = open_store();
        assert_eq!(
            store.insert("ghosts", 1, Map::new()).unwrap_err(),
            StoreError::CollectionNotFound("ghosts".into())
        );
    }

    #[test]
    fn test_schema_version_conflict() {
        let (store, _dir) = open_store();
        let err = store
            .insert("posts", 2, fields(json!({"title": "x"})))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::SchemaVersionConflict {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_unique_conflict_on_insert() {
        let (store, _dir) = open_store();
        drop(
            store
                .insert("posts", 1, fields(json!({"slug": "taken"})))
                .unwrap(),
        );
        let err = store
            .insert("posts", 1, fields(json!({"slug": "taken"})))
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueConflict { field: "slug".into() });
    }

    #[test]
    fn test_unique_allows_update_of_self() {
        let (store, _dir) = open_store();
        let id = {
            let receipt = store
                .insert("posts", 1, fields(json!({"slug": "mine", "title": "a"})))
                .unwrap();
            receipt.record.id.clone()
        };

        // Re-asserting the same slug on the same record is not a conflict.
        let receipt = store
            .update("posts", 1, &id, fields(json!({"slug": "mine", "title": "b"})))
            .unwrap();
        assert_eq!(receipt.record.fields["title"], "b");
    }

    #[test]
    fn test_unique_released_after_delete() {
        let (store, _dir) = open_store();
        let id = {
            let receipt = store
                .insert("posts", 1, fields(json!({"slug": "freed"})))
                .unwrap();
            receipt.record.id.clone()
        };
        drop(store.delete("posts", &id).unwrap());

        assert!(store
            .insert("posts", 1, fields(json!({"slug": "freed"})))
            .is_ok());
    }

    #[test]
    fn test_update_bumps_updated_and_seq() {
        let (store, _dir) = open_store();
        let (id, created) = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "v1"})))
                .unwrap();
            assert_eq!(receipt.seq, 1);
            (receipt.record.id.clone(), receipt.record.created)
        };

        let receipt = store
            .update("posts", 1, &id, fields(json!({"title": "v2"})))
            .unwrap();
        assert_eq!(receipt.seq, 2);
        assert_eq!(receipt.record.created, created);
        assert!(receipt.record.updated > created);
    }

    #[test]
    fn test_delete_returns_pre_delete_record() {
        let (store, _dir) = open_store();
        let id = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "bye"})))
                .unwrap();
            receipt.record.id.clone()
        };

        let receipt = store.delete("posts", &id).unwrap();
        assert_eq!(receipt.record.fields["title"], "bye");
        drop(receipt);

        assert!(matches!(
            store.get("posts", &id),
            Err(StoreError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_list_sort_and_pagination() {
        let (store, _dir) = open_store();
        for title in ["carrot", "apple", "banana"] {
            drop(
                store
                    .insert("posts", 1, fields(json!({"title": title})))
                    .unwrap(),
            );
        }

        let sort = SortSpec::parse("title");
        let page = store
            .list("posts", &|_| true, &sort, None, 2)
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0]["title"], "apple");
        assert_eq!(page.items[1]["title"], "banana");
        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();

        let rest = store
            .list("posts", &|_| true, &sort, Some(&cursor), 2)
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0]["title"], "carrot");
        assert!(rest.next_cursor.is_none());
    }

    #[test]
    fn test_cursor_stable_under_inserts() {
        let (store, _dir) = open_store();
        for title in ["a", "c", "e"] {
            drop(
                store
                    .insert("posts", 1, fields(json!({"title": title})))
                    .unwrap(),
            );
        }

        let sort = SortSpec::parse("title");
        let page = store.list("posts", &|_| true, &sort, None, 2).unwrap();
        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();

        // A record sorting before the cursor must not shift the next page.
        drop(
            store
                .insert("posts", 1, fields(json!({"title": "b"})))
                .unwrap(),
        );

        let rest = store
            .list("posts", &|_| true, &sort, Some(&cursor), 10)
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0]["title"], "e");
    }

    #[test]
    fn test_list_predicate_filters() {
        let (store, _dir) = open_store();
        drop(store.insert("posts", 1, fields(json!({"title": "keep"}))).unwrap());
        drop(store.insert("posts", 1, fields(json!({"title": "skip"}))).unwrap());

        let page = store
            .list(
                "posts",
                &|r| r["title"] == "keep",
                &SortSpec::default(),
                None,
                10,
            )
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_replay_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = RecordStore::open(dir.path()).unwrap();
            store.create_shard("posts", 1, vec![]);
            let id = {
                let receipt = store
                    .insert("posts", 1, fields(json!({"title": "persisted"})))
                    .unwrap();
                receipt.record.id.clone()
            };
            drop(
                store
                    .update("posts", 1, &id, fields(json!({"title": "edited"})))
                    .unwrap(),
            );
            let doomed = {
                let receipt = store
                    .insert("posts", 1, fields(json!({"title": "doomed"})))
                    .unwrap();
                receipt.record.id.clone()
            };
            drop(store.delete("posts", &doomed).unwrap());
            id
        };

        let store = RecordStore::open(dir.path()).unwrap();
        store.create_shard("posts", 1, vec![]);
        assert_eq!(store.record_count("posts"), 1);
        assert_eq!(store.get("posts", &id).unwrap().fields["title"], "edited");
    }

    #[test]
    fn test_find_by_field() {
        let (store, _dir) = open_store();
        store.create_shard("comments", 1, vec![]);
        let post_id = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "t"})))
                .unwrap();
            receipt.record.id.clone()
        };
        drop(
            store
                .insert("comments", 1, fields(json!({"post": post_id.clone()})))
                .unwrap(),
        );

        assert_eq!(store.find_by_field("comments", "post", &post_id).len(), 1);
        assert!(store.find_by_field("comments", "post", "zzz").is_empty());
    }

    #[test]
    fn test_apply_alteration_purges_fields() {
        let (store, _dir) = open_store();
        let id = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "x", "scratch": "y"})))
                .unwrap();
            receipt.record.id.clone()
        };

        store.apply_alteration("posts", &["scratch".to_string()], vec![], 2);

        let record = store.get("posts", &id).unwrap();
        assert!(!record.fields.contains_key("scratch"));
        assert_eq!(store.shard_version("posts").unwrap(), 2);

        // A write validated against the old version is now rejected.
        assert!(matches!(
            store.insert("posts", 1, fields(json!({"title": "z"}))),
            Err(StoreError::SchemaVersionConflict { .. })
        ));
    }
}
