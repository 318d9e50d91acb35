//! # Record Type
//!
//! A stored record: opaque id, server-assigned timestamps, and the field
//! map. The field set always exactly matches the owning collection's schema
//! at the version the record was last validated against.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Length of generated record ids.
const RECORD_ID_LEN: usize = 15;

/// Generate a new opaque record id: lowercase alphanumeric, fixed length.
pub fn new_record_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..RECORD_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// One stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque unique key, assigned at creation, immutable
    pub id: String,
    /// Creation timestamp, server-assigned
    pub created: DateTime<Utc>,
    /// Last-update timestamp, strictly monotonic per record
    pub updated: DateTime<Utc>,
    /// Field values, exactly matching the collection schema
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a new record with a fresh id and both timestamps set to now.
    pub fn new(fields: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            created: now,
            updated: now,
            fields,
        }
    }

    /// Flattened JSON representation: system fields alongside the field map.
    /// This is the shape responses, rule contexts and events all share.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("created".to_string(), Value::String(self.created.to_rfc3339()));
        map.insert("updated".to_string(), Value::String(self.updated.to_rfc3339()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Bump `updated` to now, guaranteeing strict monotonicity even when the
    /// clock has not advanced since the previous write.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated = if now > self.updated {
            now
        } else {
            self.updated + chrono::Duration::microseconds(1)
        };
    }
}
