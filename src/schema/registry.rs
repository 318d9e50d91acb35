//! # Collection Registry
//!
//! Single authoritative, atomically swapped map of compiled collections.
//! Define/alter/drop validate fully before anything becomes visible; the
//! compile step (regexes, parsed rules) happens exactly once per change and
//! every subsequent write reuses the compiled artifacts.
//!
//! The registry talks to record data only through the [`RecordInventory`]
//! seam: emptiness checks, snapshots for compatibility validation, and the
//! transactional field purge that accompanies a schema edit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use regex::Regex;
use serde_json::Value;

use crate::rules::parse_rule;

use super::errors::{SchemaError, SchemaResult};
use super::loader::CatalogStore;
use super::types::{
    is_valid_identifier, CascadePolicy, Collection, CompiledCollection, CompiledField,
    CompiledRules, FieldDef, FieldKind, RuleSet, SYSTEM_FIELDS,
};
use super::validator::check_value;

/// Record-data operations the registry needs during schema changes.
///
/// Implemented by the record store; the trait keeps the registry free of a
/// direct dependency on storage internals.
pub trait RecordInventory: Send + Sync {
    /// Number of live records in a collection.
    fn record_count(&self, collection: &str) -> usize;

    /// JSON snapshot of every live record (system fields included).
    fn snapshot(&self, collection: &str) -> Vec<Value>;

    /// Create the data shard for a newly defined collection.
    fn create_shard(&self, collection: &str, version: u64, unique_fields: Vec<String>);

    /// Drop a collection's data shard and purge its records.
    fn drop_shard(&self, collection: &str);

    /// Apply a schema alteration to the shard: purge removed fields from all
    /// records, replace the unique-field set, and publish the new version,
    /// all under the shard's write lock so no write observes a half-applied
    /// edit.
    fn apply_alteration(
        &self,
        collection: &str,
        removed_fields: &[String],
        unique_fields: Vec<String>,
        new_version: u64,
    );
}

/// A schema alteration request.
#[derive(Debug, Clone, Default)]
pub struct CollectionDiff {
    /// Fields to add.
    pub add: Vec<FieldDef>,
    /// Existing fields to replace (same name; kind tag must match unless the
    /// collection is empty).
    pub change: Vec<FieldDef>,
    /// Field names to remove; their values are purged from every record.
    pub remove: Vec<String>,
    /// Replacement rule set (all four operations), when rules change.
    pub rules: Option<RuleSet>,
}

impl CollectionDiff {
    /// Whether the diff contains anything at all.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.change.is_empty() && self.remove.is_empty()
            && self.rules.is_none()
    }
}

/// The schema registry.
pub struct SchemaRegistry {
    collections: RwLock<HashMap<String, Arc<CompiledCollection>>>,
    catalog: CatalogStore,
    inventory: Arc<dyn RecordInventory>,
}

impl SchemaRegistry {
    /// Open the registry: load the catalog, compile every collection, and
    /// make sure each has a data shard at the right version.
    pub fn open(catalog: CatalogStore, inventory: Arc<dyn RecordInventory>) -> SchemaResult<Self> {
        let mut collections = HashMap::new();
        for collection in catalog.load()? {
            let compiled = compile(collection)?;
            inventory.create_shard(
                compiled.name(),
                compiled.version(),
                compiled.unique_fields().map(String::from).collect(),
            );
            collections.insert(compiled.name().to_string(), Arc::new(compiled));
        }

        Ok(Self {
            collections: RwLock::new(collections),
            catalog,
            inventory,
        })
    }

    /// Look up a compiled collection.
    pub fn get(&self, name: &str) -> Option<Arc<CompiledCollection>> {
        self.collections
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// All compiled collections, sorted by name.
    pub fn list(&self) -> Vec<Arc<CompiledCollection>> {
        let mut all: Vec<_> = self
            .collections
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Define a new collection.
    pub fn define(
        &self,
        name: &str,
        fields: Vec<FieldDef>,
        rules: RuleSet,
    ) -> SchemaResult<Arc<CompiledCollection>> {
        if !is_valid_identifier(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }

        let mut collections = self.collections.write().expect("registry lock poisoned");
        if collections.contains_key(name) {
            return Err(SchemaError::DuplicateName(name.to_string()));
        }

        let known: HashSet<&str> = collections.keys().map(String::as_str).collect();
        validate_field_defs(&fields, name, &known)?;

        let compiled = Arc::new(compile(Collection {
            name: name.to_string(),
            fields,
            rules: rules.normalized(),
            version: 1,
        })?);

        self.inventory.create_shard(
            name,
            1,
            compiled.unique_fields().map(String::from).collect(),
        );
        collections.insert(name.to_string(), compiled.clone());
        self.persist(&collections)?;

        Ok(compiled)
    }

    /// Alter an existing collection. Returns the new compiled collection;
    /// its version is exactly one above the previous.
    pub fn alter(&self, name: &str, diff: CollectionDiff) -> SchemaResult<Arc<CompiledCollection>> {
        let mut collections = self.collections.write().expect("registry lock poisoned");
        let current = collections
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::CollectionNotFound(name.to_string()))?;

        let record_count = self.inventory.record_count(name);
        let next = build_altered(&current, &diff, record_count, || {
            self.inventory.snapshot(name)
        })?;

        let compiled = Arc::new(compile(next)?);

        // Relation targets of added/changed fields must exist (or be self).
        let known: HashSet<&str> = collections.keys().map(String::as_str).collect();
        for field in diff.add.iter().chain(diff.change.iter()) {
            if let FieldKind::Relation { target, .. } = &field.kind {
                if target != name && !known.contains(target.as_str()) {
                    return Err(SchemaError::invalid_field(
                        &field.name,
                        format!("relation target '{}' does not exist", target),
                    ));
                }
            }
        }

        self.inventory.apply_alteration(
            name,
            &diff.remove,
            compiled.unique_fields().map(String::from).collect(),
            compiled.version(),
        );
        collections.insert(name.to_string(), compiled.clone());
        self.persist(&collections)?;

        Ok(compiled)
    }

    /// Drop a collection and purge its records. Rejected while relation
    /// fields elsewhere still target it.
    pub fn drop_collection(&self, name: &str) -> SchemaResult<()> {
        let mut collections = self.collections.write().expect("registry lock poisoned");
        if !collections.contains_key(name) {
            return Err(SchemaError::CollectionNotFound(name.to_string()));
        }

        for other in collections.values() {
            if other.name() == name {
                continue;
            }
            for (field, target, _) in other.relation_fields() {
                if target == name {
                    return Err(SchemaError::StillReferenced {
                        collection: name.to_string(),
                        referrer: other.name().to_string(),
                        field: field.to_string(),
                    });
                }
            }
        }

        collections.remove(name);
        self.inventory.drop_shard(name);
        self.persist(&collections)?;
        Ok(())
    }

    fn persist(&self, collections: &HashMap<String, Arc<CompiledCollection>>) -> SchemaResult<()> {
        let mut defs: Vec<Collection> = collections
            .values()
            .map(|c| c.collection.clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        self.catalog.save(&defs)
    }
}

/// Compile a collection definition: parse rules, compile patterns.
pub fn compile(collection: Collection) -> SchemaResult<CompiledCollection> {
    let mut fields = Vec::with_capacity(collection.fields.len());
    for def in &collection.fields {
        let pattern = match &def.pattern {
            Some(source) => Some(Regex::new(source).map_err(|e| {
                SchemaError::invalid_field(&def.name, format!("invalid pattern: {}", e))
            })?),
            None => None,
        };
        fields.push(CompiledField {
            def: def.clone(),
            pattern,
        });
    }

    let rules = CompiledRules {
        view: compile_rule(collection.rules.view.as_deref(), "view")?,
        create: compile_rule(collection.rules.create.as_deref(), "create")?,
        update: compile_rule(collection.rules.update.as_deref(), "update")?,
        delete: compile_rule(collection.rules.delete.as_deref(), "delete")?,
    };

    Ok(CompiledCollection {
        collection,
        fields,
        rules,
    })
}

fn compile_rule(
    source: Option<&str>,
    op: &'static str,
) -> SchemaResult<Option<crate::rules::ParsedRule>> {
    match source {
        Some(text) if !text.trim().is_empty() => parse_rule(text)
            .map(Some)
            .map_err(|source| SchemaError::InvalidRule { op, source }),
        _ => Ok(None),
    }
}

/// Validate a full field list for a new collection.
fn validate_field_defs(
    fields: &[FieldDef],
    self_name: &str,
    known_collections: &HashSet<&str>,
) -> SchemaResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::invalid_field(&field.name, "duplicate field name"));
        }
        validate_field_def(field, self_name, known_collections)?;
    }
    Ok(())
}

/// Validate a single field definition's internal consistency.
fn validate_field_def(
    field: &FieldDef,
    self_name: &str,
    known_collections: &HashSet<&str>,
) -> SchemaResult<()> {
    let name = field.name.as_str();

    if !is_valid_identifier(name) {
        return Err(SchemaError::invalid_field(name, "invalid field name"));
    }
    if SYSTEM_FIELDS.contains(&name) {
        return Err(SchemaError::invalid_field(name, "name is reserved"));
    }

    // pattern: text only
    if field.pattern.is_some() && !matches!(field.kind, FieldKind::Text) {
        return Err(SchemaError::invalid_field(
            name,
            "pattern constraint is only valid on text fields",
        ));
    }

    // unique: indexable scalar kinds only
    if field.unique
        && matches!(
            field.kind,
            FieldKind::Json | FieldKind::Bool | FieldKind::List { .. }
        )
    {
        return Err(SchemaError::invalid_field(
            name,
            format!("unique is not supported on {} fields", field.kind.kind_name()),
        ));
    }

    // min/max: semantics depend on kind
    match field.kind {
        FieldKind::Number | FieldKind::Text | FieldKind::List { .. } => {
            for (label, bound) in [("min", &field.min), ("max", &field.max)] {
                if let Some(value) = bound {
                    if !value.is_number() {
                        return Err(SchemaError::invalid_field(
                            name,
                            format!("{} must be a number for {} fields", label, field.kind.kind_name()),
                        ));
                    }
                }
            }
        }
        FieldKind::Date => {
            for (label, bound) in [("min", &field.min), ("max", &field.max)] {
                if let Some(value) = bound {
                    let valid = value
                        .as_str()
                        .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                        .unwrap_or(false);
                    if !valid {
                        return Err(SchemaError::invalid_field(
                            name,
                            format!("{} must be an RFC3339 timestamp for date fields", label),
                        ));
                    }
                }
            }
        }
        _ => {
            if field.min.is_some() || field.max.is_some() {
                return Err(SchemaError::invalid_field(
                    name,
                    format!("min/max are not valid on {} fields", field.kind.kind_name()),
                ));
            }
        }
    }

    match &field.kind {
        FieldKind::Relation { target, cascade } => {
            if target != self_name && !known_collections.contains(target.as_str()) {
                return Err(SchemaError::invalid_field(
                    name,
                    format!("relation target '{}' does not exist", target),
                ));
            }
            if field.required && *cascade == CascadePolicy::SetNull {
                return Err(SchemaError::invalid_field(
                    name,
                    "set_null cascade would violate a required relation",
                ));
            }
            if field.default.is_some() {
                return Err(SchemaError::invalid_field(
                    name,
                    "relation fields cannot carry a default",
                ));
            }
        }
        _ => {
            // The default must itself satisfy the field's own constraints.
            if let Some(default) = &field.default {
                if !default.is_null() {
                    let compiled = CompiledField {
                        def: field.clone(),
                        pattern: field
                            .pattern
                            .as_deref()
                            .and_then(|p| Regex::new(p).ok()),
                    };
                    check_value(&compiled, default).map_err(|reason| {
                        SchemaError::invalid_field(name, format!("invalid default: {}", reason))
                    })?;
                }
            }
        }
    }

    Ok(())
}

/// Build the altered definition, enforcing compatibility against live data.
fn build_altered(
    current: &CompiledCollection,
    diff: &CollectionDiff,
    record_count: usize,
    snapshot: impl Fn() -> Vec<Value>,
) -> SchemaResult<Collection> {
    let empty = record_count == 0;
    let mut fields = current.collection.fields.clone();

    // Removals first, so a remove+add of the same name is caught as a kind
    // change through `change`, not silently allowed.
    for name in &diff.remove {
        let before = fields.len();
        fields.retain(|f| &f.name != name);
        if fields.len() == before {
            return Err(SchemaError::invalid_field(name, "cannot remove unknown field"));
        }
    }

    for replacement in &diff.change {
        let existing = current.field(&replacement.name).ok_or_else(|| {
            SchemaError::invalid_field(&replacement.name, "cannot change unknown field")
        })?;

        if !existing.def.kind.same_tag(&replacement.kind) && !empty {
            return Err(SchemaError::IncompatibleChange(format!(
                "field '{}' cannot change kind from {} to {} while records exist",
                replacement.name,
                existing.def.kind.kind_name(),
                replacement.kind.kind_name(),
            )));
        }

        let slot = fields
            .iter_mut()
            .find(|f| f.name == replacement.name)
            .ok_or_else(|| {
                SchemaError::invalid_field(&replacement.name, "field was removed by this diff")
            })?;
        *slot = replacement.clone();
    }

    for added in &diff.add {
        if fields.iter().any(|f| f.name == added.name) {
            return Err(SchemaError::invalid_field(&added.name, "duplicate field name"));
        }
        if added.required && added.default.is_none() && !empty {
            return Err(SchemaError::IncompatibleChange(format!(
                "field '{}' is required without a default on a non-empty collection",
                added.name
            )));
        }
        fields.push(added.clone());
    }

    let next = Collection {
        name: current.collection.name.clone(),
        fields,
        rules: diff
            .rules
            .clone()
            .map(RuleSet::normalized)
            .unwrap_or_else(|| current.collection.rules.clone()),
        version: current.version() + 1,
    };

    // Definition-level checks on the merged field list (uniqueness of names
    // was enforced incrementally; per-field consistency still needs a pass
    // for added/changed defs).
    let no_targets = HashSet::new();
    for field in diff.add.iter().chain(diff.change.iter()) {
        // Relation target existence is checked by the caller against the
        // registry map; pass self-name only here.
        let mut field_for_check = field.clone();
        if let FieldKind::Relation { target, .. } = &mut field_for_check.kind {
            *target = next.name.clone();
        }
        validate_field_def(&field_for_check, &next.name, &no_targets)?;
    }

    // Constraint tightening must hold for existing data.
    if !empty && !(diff.change.is_empty() && diff.add.is_empty()) {
        enforce_against_existing(diff, snapshot())?;
    }

    Ok(next)
}

/// Check added/changed constraints against a snapshot of live records.
fn enforce_against_existing(diff: &CollectionDiff, snapshot: Vec<Value>) -> SchemaResult<()> {
    let touched: Vec<&FieldDef> = diff.add.iter().chain(diff.change.iter()).collect();
    if touched.is_empty() {
        return Ok(());
    }

    let compiled: Vec<CompiledField> = touched
        .iter()
        .map(|def| CompiledField {
            def: (*def).clone(),
            pattern: def.pattern.as_deref().and_then(|p| Regex::new(p).ok()),
        })
        .collect();

    let mut seen_unique: HashMap<&str, HashSet<String>> = HashMap::new();

    for record in &snapshot {
        for field in &compiled {
            let value = record.get(&field.def.name).unwrap_or(&Value::Null);

            if value.is_null() {
                // Existing rows may lack a newly added optional field; a
                // required one was already forced to carry a default.
                continue;
            }

            check_value(field, value).map_err(|reason| {
                SchemaError::IncompatibleChange(format!(
                    "existing record violates new constraint on '{}': {}",
                    field.def.name, reason
                ))
            })?;

            if field.def.unique {
                let key = canonical_key(value);
                let set = seen_unique.entry(field.def.name.as_str()).or_default();
                if !set.insert(key) {
                    return Err(SchemaError::IncompatibleChange(format!(
                        "existing records hold duplicate values for unique field '{}'",
                        field.def.name
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Canonical string key for uniqueness comparison.
pub fn canonical_key(value: &Value) -> String {
    value.to_string()
}

/// Test helper: compile a definition without a registry.
#[cfg(test)]
pub fn compile_for_tests(collection: Collection) -> CompiledCollection {
    compile(collection).expect("test collection must compile")
}
