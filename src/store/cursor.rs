//! # Sorting and Cursors
//!
//! List pagination is cursor-based: the cursor encodes the sort-key position
//! of the last returned record, so pages stay stable while records are
//! inserted or deleted concurrently. Offsets would silently skip or repeat
//! rows under that churn.
//!
//! The record id is always the final tiebreak, which makes the sort total
//! and the cursor position unambiguous.

use std::cmp::Ordering;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};

/// One sort key: field name and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

/// A full sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl Default for SortSpec {
    /// Creation order: `created` ascending (id tiebreak is implicit).
    fn default() -> Self {
        Self {
            keys: vec![SortKey {
                field: "created".to_string(),
                ascending: true,
            }],
        }
    }
}

impl SortSpec {
    /// Parse a comma-separated sort string: `-created,title` sorts by
    /// `created` descending, then `title` ascending.
    pub fn parse(input: &str) -> Self {
        let keys: Vec<SortKey> = input
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    ascending: false,
                },
                None => SortKey {
                    field: part.strip_prefix('+').unwrap_or(part).to_string(),
                    ascending: true,
                },
            })
            .collect();

        if keys.is_empty() {
            Self::default()
        } else {
            Self { keys }
        }
    }

    /// The sort keys.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Compare two flattened record JSONs under this spec, id tiebreak last.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for key in &self.keys {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ordering = compare_values(left, right);
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        id_of(a).cmp(id_of(b))
    }

    /// Sort-key values of a record, for cursor encoding.
    pub fn key_values(&self, record: &Value) -> Vec<Value> {
        self.keys
            .iter()
            .map(|key| record.get(&key.field).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Compare a record's position against a cursor position.
    pub fn compare_to_cursor(&self, record: &Value, cursor: &Cursor) -> Ordering {
        for (key, cursor_value) in self.keys.iter().zip(&cursor.keys) {
            let value = record.get(&key.field).unwrap_or(&Value::Null);
            let ordering = compare_values(value, cursor_value);
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        id_of(record).cmp(cursor.id.as_str())
    }
}

fn id_of(record: &Value) -> &str {
    record.get("id").and_then(Value::as_str).unwrap_or("")
}

/// Total order over JSON scalars: null, then booleans, numbers, strings,
/// arrays. Cross-type comparisons order by that rank, so a mixed-type field
/// still sorts deterministically.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let ordering = compare_values(xi, yi);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// An opaque list cursor: the sort-key values and id of the last record of
/// the previous page, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Sort-key values at the cursor position
    #[serde(rename = "k")]
    pub keys: Vec<Value>,
    /// Record id tiebreak
    #[serde(rename = "id")]
    pub id: String,
}

impl Cursor {
    /// Cursor positioned at the given record under the given spec.
    pub fn at(spec: &SortSpec, record: &Value) -> Self {
        Self {
            keys: spec.key_values(record),
            id: id_of(record).to_string(),
        }
    }

    /// Encode to the opaque wire form.
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    /// Decode from the opaque wire form.
    pub fn decode(input: &str) -> StoreResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| StoreError::InvalidCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| StoreError::InvalidCursor)
    }
}
