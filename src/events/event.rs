//! # Mutation Events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

/// One committed mutation, as delivered to subscribers.
///
/// For deletes the record is the pre-delete state: subscribers learn which
/// record disappeared, and the view-rule recheck runs against the state the
/// rule could actually see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    /// Mutation kind
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Collection name
    pub collection: String,
    /// Per-collection commit sequence number
    #[serde(skip)]
    pub seq: u64,
    /// Flattened record JSON
    pub record: Value,
}

impl RecordEvent {
    pub fn new(kind: EventKind, collection: impl Into<String>, seq: u64, record: Value) -> Self {
        Self {
            kind,
            collection: collection.into(),
            seq,
            record,
        }
    }
}
