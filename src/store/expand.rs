//! # Relation Expansion
//!
//! Resolves relation fields into embedded records under the reserved
//! `expand` key, hop by hop through `get`, never a join. Every hop is
//! re-authorized against the target collection's view rule for the
//! requesting identity; unauthorized and dangling references are silently
//! omitted rather than failing the response. Depth is bounded to keep
//! cyclic relation graphs from exploding.

use serde_json::{Map, Value};

use crate::schema::{CompiledCollection, FieldKind, SchemaRegistry};

use super::store::RecordStore;

/// Callback deciding whether the requester may view a record of the given
/// collection. Supplied by the executor, which owns rule evaluation.
pub type ExpandAuthorizer<'a> = dyn Fn(&CompiledCollection, &Value) -> bool + 'a;

/// Parse a comma-separated expand parameter into dotted paths.
pub fn parse_expand_paths(input: &str) -> Vec<Vec<String>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(|path| path.split('.').map(|s| s.to_string()).collect())
        .collect()
}

/// Expand the given paths in-place on a flattened record JSON.
pub fn expand_record(
    store: &RecordStore,
    registry: &SchemaRegistry,
    collection: &CompiledCollection,
    record: &mut Value,
    paths: &[Vec<String>],
    max_depth: usize,
    allow: &ExpandAuthorizer,
) {
    for path in paths {
        expand_path(store, registry, collection, record, path, max_depth, allow);
    }
}

fn expand_path(
    store: &RecordStore,
    registry: &SchemaRegistry,
    collection: &CompiledCollection,
    record: &mut Value,
    path: &[String],
    depth_left: usize,
    allow: &ExpandAuthorizer,
) {
    let Some((field_name, rest)) = path.split_first() else {
        return;
    };
    if depth_left == 0 {
        return;
    }

    let Some(field) = collection.field(field_name) else {
        return;
    };
    let FieldKind::Relation { target, .. } = &field.def.kind else {
        return;
    };
    let Some(target_collection) = registry.get(target) else {
        return;
    };

    let Some(related_id) = record
        .get(field_name.as_str())
        .and_then(Value::as_str)
        .map(String::from)
    else {
        return;
    };

    let Ok(related) = store.get(target, &related_id) else {
        // Dangling reference: omit, never error.
        return;
    };
    let mut related_json = related.to_json();

    if !allow(&target_collection, &related_json) {
        return;
    }

    if !rest.is_empty() {
        expand_path(
            store,
            registry,
            &target_collection,
            &mut related_json,
            rest,
            depth_left - 1,
            allow,
        );
    }

    let Some(map) = record.as_object_mut() else {
        return;
    };
    let expand_slot = map
        .entry("expand".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(expand_map) = expand_slot.as_object_mut() {
        expand_map.insert(field_name.clone(), related_json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        CascadePolicy, CatalogStore, FieldDef, FieldKind, RecordInventory, RuleSet, SchemaRegistry,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (Arc<RecordStore>, SchemaRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).unwrap());
        let registry = SchemaRegistry::open(
            CatalogStore::new(dir.path()),
            Arc::clone(&store) as Arc<dyn RecordInventory>,
        )
        .unwrap();

        registry
            .define(
                "users",
                vec![FieldDef::new("name", FieldKind::Text)],
                RuleSet::default(),
            )
            .unwrap();
        registry
            .define(
                "posts",
                vec![
                    FieldDef::new("title", FieldKind::Text),
                    FieldDef::new(
                        "author",
                        FieldKind::Relation {
                            target: "users".into(),
                            cascade: CascadePolicy::Restrict,
                        },
                    ),
                ],
                RuleSet::default(),
            )
            .unwrap();

        (store, registry, dir)
    }

    #[test]
    fn test_expand_embeds_related_record() {
        let (store, registry, _dir) = setup();
        let user_id = {
            let receipt = store
                .insert("users", 1, fields(json!({"name": "ada"})))
                .unwrap();
            receipt.record.id.clone()
        };
        let post = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "t", "author": user_id})))
                .unwrap();
            receipt.record.clone()
        };

        let collection = registry.get("posts").unwrap();
        let mut json = post.to_json();
        expand_record(
            &store,
            &registry,
            &collection,
            &mut json,
            &parse_expand_paths("author"),
            6,
            &|_, _| true,
        );

        assert_eq!(json["expand"]["author"]["name"], "ada");
    }

    #[test]
    fn test_expand_denied_hop_is_omitted() {
        let (store, registry, _dir) = setup();
        let user_id = {
            let receipt = store
                .insert("users", 1, fields(json!({"name": "ada"})))
                .unwrap();
            receipt.record.id.clone()
        };
        let post = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "t", "author": user_id})))
                .unwrap();
            receipt.record.clone()
        };

        let collection = registry.get("posts").unwrap();
        let mut json = post.to_json();
        expand_record(
            &store,
            &registry,
            &collection,
            &mut json,
            &parse_expand_paths("author"),
            6,
            &|target, _| target.name() != "users",
        );

        assert!(json.get("expand").is_none());
    }

    #[test]
    fn test_expand_dangling_reference_is_omitted() {
        let (store, registry, _dir) = setup();
        let post = {
            let receipt = store
                .insert("posts", 1, fields(json!({"title": "t", "author": "gone404gone404g"})))
                .unwrap();
            receipt.record.clone()
        };

        let collection = registry.get("posts").unwrap();
        let mut json = post.to_json();
        expand_record(
            &store,
            &registry,
            &collection,
            &mut json,
            &parse_expand_paths("author"),
            6,
            &|_, _| true,
        );

        assert!(json.get("expand").is_none());
    }

    #[test]
    fn test_expand_depth_bound_stops_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).unwrap());
        let registry = SchemaRegistry::open(
            CatalogStore::new(dir.path()),
            Arc::clone(&store) as Arc<dyn RecordInventory>,
        )
        .unwrap();
        registry
            .define(
                "nodes",
                vec![FieldDef::new(
                    "next",
                    FieldKind::Relation {
                        target: "nodes".into(),
                        cascade: CascadePolicy::SetNull,
                    },
                )],
                RuleSet::default(),
            )
            .unwrap();

        let a = {
            let receipt = store.insert("nodes", 1, Map::new()).unwrap();
            receipt.record.id.clone()
        };
        let b = {
            let receipt = store
                .insert("nodes", 1, fields(json!({"next": a.clone()})))
                .unwrap();
            receipt.record.id.clone()
        };
        drop(
            store
                .update("nodes", 1, &a, fields(json!({"next": b.clone()})))
                .unwrap(),
        );

        let collection = registry.get("nodes").unwrap();
        let mut json = store.get("nodes", &a).unwrap().to_json();
        // A cyclic chain: depth 2 embeds exactly two hops and stops.
        expand_record(
            &store,
            &registry,
            &collection,
            &mut json,
            &[vec!["next".into(), "next".into(), "next".into()]],
            2,
            &|_, _| true,
        );

        let first = &json["expand"]["next"];
        assert_eq!(first["id"], b.as_str());
        let second = &first["expand"]["next"];
        assert_eq!(second["id"], a.as_str());
        assert!(second.get("expand").is_none());
    }

    #[test]
    fn test_parse_expand_paths() {
        assert_eq!(
            parse_expand_paths("author, author.group ,"),
            vec![
                vec!["author".to_string()],
                vec!["author".to_string(), "group".to_string()],
            ]
        );
    }
}
