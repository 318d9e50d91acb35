//! # Schema Registry
//!
//! Collections are runtime-defined schemas. The registry validates
//! definitions, compiles them (regexes compiled, access rules parsed) into
//! reusable validators, persists the catalog, and hands out atomically
//! swapped snapshots.
//!
//! Design principles:
//! - Definitions are validated before they are visible; a collection whose
//!   rule or pattern fails to compile never enters the registry.
//! - Schema edits bump a per-collection version; writes validated against an
//!   older version are rejected at commit, never silently coerced.
//! - Destructive narrowing (kind changes, new required-without-default on
//!   non-empty collections, constraints violated by existing records) is
//!   rejected as an incompatible change.
//! - Removed fields are purged from all records under the same collection
//!   lock that publishes the new version.

mod errors;
mod loader;
mod registry;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaResult};
pub use loader::CatalogStore;
pub use registry::{canonical_key, CollectionDiff, RecordInventory, SchemaRegistry};
pub use types::{
    is_valid_identifier, CascadePolicy, Collection, CompiledCollection, CompiledField, FieldDef,
    FieldKind, RuleOp, RuleSet, ScalarKind, SYSTEM_FIELDS,
};
pub use validator::{validate_fields, ValidationMode};
