//! # Executor Core

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::LimitsConfig;
use crate::events::{EventBus, EventKind, RecordEvent};
use crate::rules::{evaluate, parse_filter, RuleContext};
use crate::schema::{
    validate_fields, CascadePolicy, CollectionDiff, CompiledCollection, FieldDef, RuleOp, RuleSet,
    SchemaRegistry, ValidationMode,
};
use crate::store::{
    expand_record, parse_expand_paths, CommitReceipt, Cursor, RecordStore, SortSpec, StoreError,
};

use super::errors::{EngineError, EngineResult};
use super::request::{ListQuery, ListResult, RequestContext};

/// The request orchestrator.
pub struct CrudExecutor {
    registry: Arc<SchemaRegistry>,
    store: Arc<RecordStore>,
    bus: Arc<EventBus>,
    limits: LimitsConfig,
}

impl CrudExecutor {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<RecordStore>,
        bus: Arc<EventBus>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            registry,
            store,
            bus,
            limits,
        }
    }

    /// The schema registry (admin surfaces read through the executor).
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    // ==================
    // Record operations
    // ==================

    /// Create a record.
    pub fn create(
        &self,
        collection_name: &str,
        ctx: &RequestContext,
        data: Map<String, Value>,
        expand: Option<&str>,
    ) -> EngineResult<Value> {
        let collection = self.resolve(collection_name)?;

        // Create prechecks run without a candidate record bound.
        if !ctx.is_admin() {
            match collection.rules.get(RuleOp::Create) {
                Some(rule) if evaluate(rule, &self.rule_ctx(ctx, None)) => {}
                _ => return Err(EngineError::Forbidden),
            }
        }

        let validated = validate_fields(&collection, &data, ValidationMode::Create)?;
        self.check_relation_targets(&collection, &validated)?;

        // A duplicate generated id is a pure storage race: retried exactly
        // once with a fresh id, without re-running rules or validation.
        let receipt = match self
            .store
            .insert(collection_name, collection.version(), validated.clone())
        {
            Err(StoreError::DuplicateId(_)) => {
                self.store
                    .insert(collection_name, collection.version(), validated)?
            }
            other => other?,
        };

        let mut json = receipt.record.to_json();
        self.emit(EventKind::Create, collection_name, &receipt, json.clone());
        drop(receipt);

        if let Some(paths) = expand {
            self.apply_expand(&collection, &mut json, paths, ctx);
        }
        Ok(json)
    }

    /// Fetch one record.
    pub fn view(
        &self,
        collection_name: &str,
        ctx: &RequestContext,
        id: &str,
        expand: Option<&str>,
    ) -> EngineResult<Value> {
        let collection = self.resolve(collection_name)?;
        let view_rule = collection.rules.get(RuleOp::View);

        // Operation-level denial: reveals nothing about any record.
        if !ctx.is_admin() && view_rule.is_none() {
            return Err(EngineError::Forbidden);
        }

        let record = self.store.get(collection_name, id)?;
        let mut json = record.to_json();

        if !ctx.is_admin() {
            if let Some(rule) = view_rule {
                // Record-level denial answers NotFound: a rule-hidden record
                // is indistinguishable from an absent one.
                if !evaluate(rule, &self.rule_ctx(ctx, Some(&json))) {
                    return Err(EngineError::NotFound);
                }
            }
        }

        if let Some(paths) = expand {
            self.apply_expand(&collection, &mut json, paths, ctx);
        }
        Ok(json)
    }

    /// List records. The client filter is intersected with the view rule,
    /// never substituted for it.
    pub fn list(
        &self,
        collection_name: &str,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> EngineResult<ListResult> {
        let collection = self.resolve(collection_name)?;
        let view_rule = collection.rules.get(RuleOp::View);
        let admin = ctx.is_admin();

        if !admin && view_rule.is_none() {
            return Err(EngineError::Forbidden);
        }

        let parsed_filter = match &query.filter {
            Some(source) => Some(
                parse_filter(source)
                    .map_err(|e| EngineError::BadRequest(format!("invalid filter: {}", e)))?,
            ),
            None => None,
        };

        let sort = query
            .sort
            .as_deref()
            .map(SortSpec::parse)
            .unwrap_or_default();

        let cursor = match &query.cursor {
            Some(encoded) => Some(Cursor::decode(encoded)?),
            None => None,
        };

        let limit = query.limit.unwrap_or(self.limits.default_limit);
        if limit == 0 || limit > self.limits.max_limit {
            return Err(EngineError::BadRequest(format!(
                "limit must be between 1 and {}",
                self.limits.max_limit
            )));
        }

        let predicate = |record: &Value| {
            let rc = self.rule_ctx(ctx, Some(record));
            let rule_ok = admin || view_rule.map(|rule| evaluate(rule, &rc)).unwrap_or(false);
            let filter_ok = parsed_filter
                .as_ref()
                .map(|filter| evaluate(filter, &rc))
                .unwrap_or(true);
            rule_ok && filter_ok
        };

        let page = self
            .store
            .list(collection_name, &predicate, &sort, cursor.as_ref(), limit)?;

        let mut items = page.items;
        if let Some(paths) = &query.expand {
            for item in &mut items {
                self.apply_expand(&collection, item, paths, ctx);
            }
        }

        Ok(ListResult {
            items,
            cursor: page.next_cursor,
        })
    }

    /// Apply a partial update.
    pub fn update(
        &self,
        collection_name: &str,
        ctx: &RequestContext,
        id: &str,
        patch: Map<String, Value>,
        expand: Option<&str>,
    ) -> EngineResult<Value> {
        let collection = self.resolve(collection_name)?;
        self.authorize_record_op(&collection, RuleOp::Update, ctx, collection_name, id)?;

        let validated = validate_fields(&collection, &patch, ValidationMode::Patch)?;
        self.check_relation_targets(&collection, &validated)?;

        let receipt = self
            .store
            .update(collection_name, collection.version(), id, validated)?;

        let mut json = receipt.record.to_json();
        self.emit(EventKind::Update, collection_name, &receipt, json.clone());
        drop(receipt);

        if let Some(paths) = expand {
            self.apply_expand(&collection, &mut json, paths, ctx);
        }
        Ok(json)
    }

    /// Delete a record, honoring relation cascade policies.
    pub fn delete(
        &self,
        collection_name: &str,
        ctx: &RequestContext,
        id: &str,
    ) -> EngineResult<()> {
        let collection = self.resolve(collection_name)?;
        self.authorize_record_op(&collection, RuleOp::Delete, ctx, collection_name, id)?;

        self.cascade(collection_name, id)?;

        let receipt = self.store.delete(collection_name, id)?;
        let json = receipt.record.to_json();
        self.emit(EventKind::Delete, collection_name, &receipt, json);
        drop(receipt);
        Ok(())
    }

    // ==================
    // Schema operations (admin only)
    // ==================

    /// Define a new collection.
    pub fn define_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
        fields: Vec<FieldDef>,
        rules: RuleSet,
    ) -> EngineResult<Value> {
        self.require_admin(ctx)?;
        let compiled = self.registry.define(name, fields, rules)?;
        collection_json(&compiled)
    }

    /// Alter an existing collection.
    pub fn alter_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
        diff: CollectionDiff,
    ) -> EngineResult<Value> {
        self.require_admin(ctx)?;
        let compiled = self.registry.alter(name, diff)?;
        collection_json(&compiled)
    }

    /// Drop a collection.
    pub fn drop_collection(&self, ctx: &RequestContext, name: &str) -> EngineResult<()> {
        self.require_admin(ctx)?;
        self.registry.drop_collection(name)?;
        Ok(())
    }

    /// Catalog listing.
    pub fn list_collections(&self, ctx: &RequestContext) -> EngineResult<Vec<Value>> {
        self.require_admin(ctx)?;
        self.registry
            .list()
            .iter()
            .map(|c| collection_json(c))
            .collect()
    }

    /// One collection definition.
    pub fn get_collection(&self, ctx: &RequestContext, name: &str) -> EngineResult<Value> {
        self.require_admin(ctx)?;
        let compiled = self.resolve(name)?;
        collection_json(&compiled)
    }

    // ==================
    // Internals
    // ==================

    fn resolve(&self, collection_name: &str) -> EngineResult<Arc<CompiledCollection>> {
        self.registry
            .get(collection_name)
            .ok_or(EngineError::NotFound)
    }

    fn require_admin(&self, ctx: &RequestContext) -> EngineResult<()> {
        if ctx.is_admin() {
            Ok(())
        } else {
            Err(EngineError::Forbidden)
        }
    }

    fn rule_ctx<'a>(
        &self,
        ctx: &'a RequestContext,
        record: Option<&'a Value>,
    ) -> RuleContext<'a> {
        let mut rc = RuleContext::anonymous().with_query(&ctx.query);
        if let Some(identity) = &ctx.identity {
            rc = rc.with_auth(&identity.claims);
        }
        if let Some(record) = record {
            rc = rc.with_record(record);
        }
        rc
    }

    /// Authorization for update/delete: the rule is evaluated against the
    /// *pre-mutation* record, captured before any patch is applied.
    fn authorize_record_op(
        &self,
        collection: &CompiledCollection,
        op: RuleOp,
        ctx: &RequestContext,
        collection_name: &str,
        id: &str,
    ) -> EngineResult<()> {
        if ctx.is_admin() {
            return Ok(());
        }
        let Some(rule) = collection.rules.get(op) else {
            return Err(EngineError::Forbidden);
        };

        let pre_record = self.store.get(collection_name, id)?;
        let pre_json = pre_record.to_json();
        if !evaluate(rule, &self.rule_ctx(ctx, Some(&pre_json))) {
            return Err(EngineError::NotFound);
        }
        Ok(())
    }

    /// Relation values must reference existing target records. Checked
    /// before the write; cross-collection races past this point are outside
    /// the engine's isolation guarantees.
    fn check_relation_targets(
        &self,
        collection: &CompiledCollection,
        validated: &Map<String, Value>,
    ) -> EngineResult<()> {
        for (field, target, _) in collection.relation_fields() {
            if let Some(Value::String(related_id)) = validated.get(field) {
                if !self.store.exists(target, related_id) {
                    return Err(EngineError::ValidationFailed {
                        field: field.to_string(),
                        reason: format!("related record '{}' does not exist", related_id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Enforce cascade policies of relation fields pointing at the record
    /// being deleted: `restrict` blocks, `set_null` commits null-out updates
    /// (each published as a regular update event) before the delete.
    fn cascade(&self, target: &str, id: &str) -> EngineResult<()> {
        for referrer in self.registry.list() {
            for (field, field_target, policy) in referrer.relation_fields() {
                if field_target != target {
                    continue;
                }
                let referencing: Vec<String> = self
                    .store
                    .find_by_field(referrer.name(), field, id)
                    .into_iter()
                    // A record referencing itself never blocks its own delete.
                    .filter(|rid| !(referrer.name() == target && rid == id))
                    .collect();
                if referencing.is_empty() {
                    continue;
                }

                match policy {
                    CascadePolicy::Restrict => {
                        return Err(EngineError::Conflict(format!(
                            "record is referenced by '{}.{}'",
                            referrer.name(),
                            field
                        )));
                    }
                    CascadePolicy::SetNull => {
                        for rid in referencing {
                            let mut patch = Map::new();
                            patch.insert(field.to_string(), Value::Null);
                            let receipt = self.store.update(
                                referrer.name(),
                                referrer.version(),
                                &rid,
                                patch,
                            )?;
                            let json = receipt.record.to_json();
                            self.emit(EventKind::Update, referrer.name(), &receipt, json);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Publish strictly after commit, while the receipt's permit is held.
    fn emit(&self, kind: EventKind, collection: &str, receipt: &CommitReceipt, record: Value) {
        self.bus
            .publish(&RecordEvent::new(kind, collection, receipt.seq, record));
    }

    fn apply_expand(
        &self,
        collection: &CompiledCollection,
        json: &mut Value,
        paths_source: &str,
        ctx: &RequestContext,
    ) {
        let paths = parse_expand_paths(paths_source);
        if paths.is_empty() {
            return;
        }

        let admin = ctx.is_admin();
        let allow = |target: &CompiledCollection, record: &Value| -> bool {
            if admin {
                return true;
            }
            match target.rules.get(RuleOp::View) {
                Some(rule) => evaluate(rule, &self.rule_ctx(ctx, Some(record))),
                None => false,
            }
        };

        expand_record(
            &self.store,
            &self.registry,
            collection,
            json,
            &paths,
            self.limits.expand_max_depth,
            &allow,
        );
    }
}

fn collection_json(compiled: &CompiledCollection) -> EngineResult<Value> {
    serde_json::to_value(&compiled.collection).map_err(|e| EngineError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::events::BusMessage;
    use crate::schema::{CatalogStore, FieldKind, RecordInventory};
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (CrudExecutor, Arc<EventBus>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).unwrap());
        let registry = Arc::new(
            SchemaRegistry::open(
                CatalogStore::new(dir.path()),
                Arc::clone(&store) as Arc<dyn RecordInventory>,
            )
            .unwrap(),
        );
        let bus = Arc::new(EventBus::new(Arc::clone(&registry), 64));
        let executor = CrudExecutor::new(
            registry,
            store,
            Arc::clone(&bus),
            LimitsConfig::default(),
        );
        (executor, bus, dir)
    }

    fn admin() -> RequestContext {
        RequestContext::authenticated(Identity::admin("root"))
    }

    fn user(id: &str) -> RequestContext {
        RequestContext::authenticated(Identity::new(id, false, Map::new()))
    }

    /// The `posts` collection of the acceptance scenario: title required,
    /// published defaulting to false, author-gated updates.
    fn define_posts(executor: &CrudExecutor) {
        executor
            .define_collection(
                &admin(),
                "posts",
                vec![
                    FieldDef::new("title", FieldKind::Text).required(),
                    FieldDef::new("published", FieldKind::Bool).with_default(json!(false)),
                    FieldDef::new("author", FieldKind::Text),
                ],
                RuleSet {
                    view: Some("true".into()),
                    create: Some("@request.auth.id != null".into()),
                    update: Some("record.author = @request.auth.id".into()),
                    delete: Some("record.author = @request.auth.id".into()),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_scenario_create_applies_default() {
        let (executor, _bus, _dir) = setup();
        define_posts(&executor);

        let record = executor
            .create("posts", &user("u1"), fields(json!({"title": "x"})), None)
            .unwrap();
        assert_eq!(record["published"], false);
        assert!(record["id"].is_string());
    }

    #[test]
    fn test_scenario_missing_title_names_field() {
        let (executor, _bus, _dir) = setup();
        define_posts(&executor);

        let err = executor
            .create("posts", &user("u1"), Map::new(), None)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::ValidationFailed {
                field: "title".into(),
                reason: "required field missing".into()
            }
        );
    }

    #[test]
    fn test_scenario_update_by_non_author_denied() {
        let (executor, _bus, _dir) = setup();
        define_posts(&executor);

        let record = executor
            .create(
                "posts",
                &user("author1"),
                fields(json!({"title": "x", "author": "author1"})),
                None,
            )
            .unwrap();
        let id = record["id"].as_str().unwrap();

        // The update rule excludes this record for u2; existence is hidden.
        let err = executor
            .update(
                "posts",
                &user("u2"),
                id,
                fields(json!({"published": true})),
                None,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::NotFound);

        let updated = executor
            .update(
                "posts",
                &user("author1"),
                id,
                fields(json!({"published": true})),
                None,
            )
            .unwrap();
        assert_eq!(updated["published"], true);
    }

    #[test]
    fn test_fail_closed_without_rules() {
        let (executor, _bus, _dir) = setup();
        executor
            .define_collection(
                &admin(),
                "secrets",
                vec![FieldDef::new("body", FieldKind::Text)],
                RuleSet::default(),
            )
            .unwrap();

        let anon = RequestContext::anonymous();
        assert_eq!(
            executor.list("secrets", &anon, &ListQuery::default()),
            Err(EngineError::Forbidden)
        );
        assert_eq!(
            executor.create("secrets", &anon, Map::new(), None),
            Err(EngineError::Forbidden)
        );
        assert_eq!(
            executor.view("secrets", &anon, "whatever", None),
            Err(EngineError::Forbidden)
        );

        // Admins still operate (explicit bypass, not a silent one).
        assert!(executor
            .create("secrets", &admin(), fields(json!({"body": "x"})), None)
            .is_ok());
    }

    #[test]
    fn test_list_filter_intersects_view_rule() {
        let (executor, _bus, _dir) = setup();
        executor
            .define_collection(
                &admin(),
                "notes",
                vec![
                    FieldDef::new("owner", FieldKind::Text),
                    FieldDef::new("kind", FieldKind::Text),
                ],
                RuleSet {
                    view: Some("record.owner = @request.auth.id".into()),
                    create: Some("true".into()),
                    ..RuleSet::default()
                },
            )
            .unwrap();

        for (owner, kind) in [("u1", "a"), ("u1", "b"), ("u2", "a")] {
            executor
                .create(
                    "notes",
                    &admin(),
                    fields(json!({"owner": owner, "kind": kind})),
                    None,
                )
                .unwrap();
        }

        // The filter matches records of both owners; the view rule keeps
        // only u1's. A filter can never widen visibility.
        let result = executor
            .list(
                "notes",
                &user("u1"),
                &ListQuery {
                    filter: Some("kind = 'a'".into()),
                    ..ListQuery::default()
                },
            )
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0]["owner"], "u1");
    }

    #[test]
    fn test_view_rule_absent_rule_vs_hidden_record() {
        let (executor, _bus, _dir) = setup();
        executor
            .define_collection(
                &admin(),
                "notes",
                vec![FieldDef::new("owner", FieldKind::Text)],
                RuleSet {
                    view: Some("record.owner = @request.auth.id".into()),
                    create: Some("true".into()),
                    ..RuleSet::default()
                },
            )
            .unwrap();

        let record = executor
            .create("notes", &user("u1"), fields(json!({"owner": "u1"})), None)
            .unwrap();
        let id = record["id"].as_str().unwrap();

        // Hidden record and absent record are the same answer.
        assert_eq!(
            executor.view("notes", &user("u2"), id, None),
            Err(EngineError::NotFound)
        );
        assert_eq!(
            executor.view("notes", &user("u2"), "zzzzzzzzzzzzzzz", None),
            Err(EngineError::NotFound)
        );
        assert!(executor.view("notes", &user("u1"), id, None).is_ok());
    }

    #[test]
    fn test_mutation_events_reach_bus() {
        let (executor, bus, _dir) = setup();
        define_posts(&executor);

        let (_sid, mut stream) = bus.subscribe("posts", None, None, true).unwrap();

        let record = executor
            .create("posts", &user("u1"), fields(json!({"title": "x", "author": "u1"})), None)
            .unwrap();
        let id = record["id"].as_str().unwrap();
        executor
            .update("posts", &user("u1"), id, fields(json!({"published": true})), None)
            .unwrap();
        executor.delete("posts", &user("u1"), id).unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            match futures_util::FutureExt::now_or_never(stream.recv()) {
                Some(Some(BusMessage::Event(event))) => kinds.push(event.kind),
                other => panic!("expected a buffered event, got {:?}", other),
            }
        }
        assert_eq!(
            kinds,
            vec![EventKind::Create, EventKind::Update, EventKind::Delete]
        );
    }

    #[test]
    fn test_relation_cascade_restrict_and_set_null() {
        let (executor, _bus, _dir) = setup();
        let ctx = admin();

        executor
            .define_collection(
                &ctx,
                "users",
                vec![FieldDef::new("name", FieldKind::Text)],
                RuleSet::default(),
            )
            .unwrap();
        executor
            .define_collection(
                &ctx,
                "posts",
                vec![FieldDef::new(
                    "author",
                    FieldKind::Relation {
                        target: "users".into(),
                        cascade: CascadePolicy::Restrict,
                    },
                )],
                RuleSet::default(),
            )
            .unwrap();
        executor
            .define_collection(
                &ctx,
                "drafts",
                vec![FieldDef::new(
                    "owner",
                    FieldKind::Relation {
                        target: "users".into(),
                        cascade: CascadePolicy::SetNull,
                    },
                )],
                RuleSet::default(),
            )
            .unwrap();

        let user_record = executor
            .create("users", &ctx, fields(json!({"name": "ada"})), None)
            .unwrap();
        let user_id = user_record["id"].as_str().unwrap().to_string();

        let post = executor
            .create("posts", &ctx, fields(json!({"author": user_id.clone()})), None)
            .unwrap();
        let draft = executor
            .create("drafts", &ctx, fields(json!({"owner": user_id.clone()})), None)
            .unwrap();

        // Restricted by posts.author.
        assert!(matches!(
            executor.delete("users", &ctx, &user_id),
            Err(EngineError::Conflict(_))
        ));

        executor
            .delete("posts", &ctx, post["id"].as_str().unwrap())
            .unwrap();

        // Now only the set_null reference remains; delete nulls it out.
        executor.delete("users", &ctx, &user_id).unwrap();
        let draft_after = executor
            .view("drafts", &ctx, draft["id"].as_str().unwrap(), None)
            .unwrap();
        assert_eq!(draft_after["owner"], Value::Null);
    }

    #[test]
    fn test_relation_target_must_exist() {
        let (executor, _bus, _dir) = setup();
        let ctx = admin();
        executor
            .define_collection(
                &ctx,
                "users",
                vec![FieldDef::new("name", FieldKind::Text)],
                RuleSet::default(),
            )
            .unwrap();
        executor
            .define_collection(
                &ctx,
                "posts",
                vec![FieldDef::new(
                    "author",
                    FieldKind::Relation {
                        target: "users".into(),
                        cascade: CascadePolicy::Restrict,
                    },
                )],
                RuleSet::default(),
            )
            .unwrap();

        let err = executor
            .create("posts", &ctx, fields(json!({"author": "nosuchrecord123"})), None)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ValidationFailed { field, .. } if field == "author"
        ));
    }

    #[test]
    fn test_schema_ops_require_admin() {
        let (executor, _bus, _dir) = setup();
        assert_eq!(
            executor.define_collection(&user("u1"), "posts", vec![], RuleSet::default()),
            Err(EngineError::Forbidden)
        );
        assert_eq!(
            executor.list_collections(&RequestContext::anonymous()),
            Err(EngineError::Forbidden)
        );
    }

    #[test]
    fn test_list_limit_bounds() {
        let (executor, _bus, _dir) = setup();
        define_posts(&executor);

        let err = executor
            .list(
                "posts",
                &admin(),
                &ListQuery {
                    limit: Some(100_000),
                    ..ListQuery::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }

    #[test]
    fn test_expand_through_executor() {
        let (executor, _bus, _dir) = setup();
        let ctx = admin();
        executor
            .define_collection(
                &ctx,
                "users",
                vec![FieldDef::new("name", FieldKind::Text)],
                RuleSet {
                    view: Some("true".into()),
                    ..RuleSet::default()
                },
            )
            .unwrap();
        executor
            .define_collection(
                &ctx,
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
                RuleSet {
                    view: Some("true".into()),
                    create: Some("true".into()),
                    ..RuleSet::default()
                },
            )
            .unwrap();

        let user_record = executor
            .create("users", &ctx, fields(json!({"name": "ada"})), None)
            .unwrap();
        let post = executor
            .create(
                "posts",
                &RequestContext::anonymous(),
                fields(json!({"title": "t", "author": user_record["id"].clone()})),
                Some("author"),
            )
            .unwrap();

        assert_eq!(post["expand"]["author"]["name"], "ada");
    }
}
