//! # Schema Types
//!
//! Field kinds are a closed tagged variant; every validator and storage
//! encoder dispatches over this tag. There is no open-ended dynamic typing
//! anywhere in the engine.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::ParsedRule;

/// Field names reserved for the engine. `expand` is reserved because
/// relation expansion embeds related records under that key in responses.
pub const SYSTEM_FIELDS: &[&str] = &["id", "created", "updated", "expand"];

/// Identifier syntax for collection and field names: `[a-z_][a-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Supported field kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// UTF-8 text
    Text,
    /// 64-bit float
    Number,
    /// Boolean
    Bool,
    /// RFC3339 UTC timestamp, stored as text
    Date,
    /// Opaque file-reference token resolved by the file storage collaborator
    File,
    /// Arbitrary JSON value
    Json,
    /// Reference to a record in another (or the same) collection
    Relation {
        /// Target collection name
        target: String,
        /// What happens to referencing records when the target is deleted
        #[serde(default)]
        cascade: CascadePolicy,
    },
    /// Homogeneous list of scalar values
    List {
        /// Element kind
        element: ScalarKind,
    },
}

impl FieldKind {
    /// Kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Date => "date",
            FieldKind::File => "file",
            FieldKind::Json => "json",
            FieldKind::Relation { .. } => "relation",
            FieldKind::List { .. } => "list",
        }
    }

    /// Same tag, ignoring kind parameters (relation target, list element).
    pub fn same_tag(&self, other: &FieldKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Scalar kinds allowed as list elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Text,
    Number,
    Bool,
    Date,
    File,
}

impl ScalarKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarKind::Text => "text",
            ScalarKind::Number => "number",
            ScalarKind::Bool => "bool",
            ScalarKind::Date => "date",
            ScalarKind::File => "file",
        }
    }
}

/// Delete behavior for relation fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Referencing records block deletion of the target (default-safe)
    #[default]
    Restrict,
    /// References are nulled out when the target is deleted
    SetNull,
}

/// One field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name, unique within the collection
    pub name: String,
    /// Field kind
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Whether the field must be present and non-null
    #[serde(default)]
    pub required: bool,
    /// Whether values must be unique across the collection
    #[serde(default)]
    pub unique: bool,
    /// Default value applied on create when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Lower bound; numeric range for number, length for text/list,
    /// RFC3339 bound for date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    /// Upper bound, same semantics as `min`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    /// Regular expression constraint (text only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldDef {
    /// A plain field of the given kind with no constraints.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            default: None,
            min: None,
            max: None,
            pattern: None,
        }
    }

    /// Builder: mark required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: mark unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Builder: set default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// The four per-operation access rules, as source strings.
///
/// `None` (or an empty string, normalized to `None`) denies the operation
/// for non-admin identities: fail-closed is the only safe default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl RuleSet {
    /// Normalize empty strings to absent rules.
    pub fn normalized(mut self) -> Self {
        for slot in [
            &mut self.view,
            &mut self.create,
            &mut self.update,
            &mut self.delete,
        ] {
            if slot.as_deref().map(str::trim) == Some("") {
                *slot = None;
            }
        }
        self
    }

    /// Rule source for one operation.
    pub fn get(&self, op: RuleOp) -> Option<&str> {
        match op {
            RuleOp::View => self.view.as_deref(),
            RuleOp::Create => self.create.as_deref(),
            RuleOp::Update => self.update.as_deref(),
            RuleOp::Delete => self.delete.as_deref(),
        }
    }
}

/// The four rule-gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    View,
    Create,
    Update,
    Delete,
}

impl RuleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOp::View => "view",
            RuleOp::Create => "create",
            RuleOp::Update => "update",
            RuleOp::Delete => "delete",
        }
    }
}

/// A collection definition as persisted in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique, immutable name
    pub name: String,
    /// Ordered field definitions
    pub fields: Vec<FieldDef>,
    /// Access rules
    #[serde(default)]
    pub rules: RuleSet,
    /// Schema version, bumped by every successful alteration
    #[serde(default)]
    pub version: u64,
}

/// A field with its compiled artifacts.
#[derive(Debug, Clone)]
pub struct CompiledField {
    /// The definition
    pub def: FieldDef,
    /// Compiled `pattern` constraint
    pub pattern: Option<Regex>,
}

impl PartialEq for CompiledField {
    fn eq(&self, other: &Self) -> bool {
        self.def == other.def
            && self.pattern.as_ref().map(Regex::as_str)
                == other.pattern.as_ref().map(Regex::as_str)
    }
}

/// Parsed access rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledRules {
    pub view: Option<ParsedRule>,
    pub create: Option<ParsedRule>,
    pub update: Option<ParsedRule>,
    pub delete: Option<ParsedRule>,
}

impl CompiledRules {
    /// Parsed rule for one operation.
    pub fn get(&self, op: RuleOp) -> Option<&ParsedRule> {
        match op {
            RuleOp::View => self.view.as_ref(),
            RuleOp::Create => self.create.as_ref(),
            RuleOp::Update => self.update.as_ref(),
            RuleOp::Delete => self.delete.as_ref(),
        }
    }
}

/// A collection compiled for request-path use: regexes compiled, rules
/// parsed. Built once per define/alter, shared immutably afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCollection {
    /// The persisted definition
    pub collection: Collection,
    /// Compiled fields, same order as the definition
    pub fields: Vec<CompiledField>,
    /// Parsed rules
    pub rules: CompiledRules,
}

impl CompiledCollection {
    /// The collection name.
    pub fn name(&self) -> &str {
        &self.collection.name
    }

    /// The schema version.
    pub fn version(&self) -> u64 {
        self.collection.version
    }

    /// Look up a compiled field by name.
    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.def.name == name)
    }

    /// Names of unique fields.
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.def.unique)
            .map(|f| f.def.name.as_str())
    }

    /// Relation fields with their targets and cascade policies.
    pub fn relation_fields(&self) -> impl Iterator<Item = (&str, &str, CascadePolicy)> {
        self.fields.iter().filter_map(|f| match &f.def.kind {
            FieldKind::Relation { target, cascade } => {
                Some((f.def.name.as_str(), target.as_str(), *cascade))
            }
            _ => None,
        })
    }
}
