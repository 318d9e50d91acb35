//! # Record Validation
//!
//! Validates candidate field maps against a compiled collection. Everything
//! checkable without row visibility happens here; uniqueness and
//! relation-target existence are delegated to the record store, which
//! re-checks them atomically with the write they guard.

use chrono::DateTime;
use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::types::{CompiledCollection, CompiledField, FieldKind, ScalarKind, SYSTEM_FIELDS};

/// How much of the candidate to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full validation: defaults applied, every schema field checked.
    Create,
    /// Partial validation: only the supplied fields are checked.
    Patch,
}

/// Validate a candidate field map.
///
/// In `Create` mode the result contains every schema field: defaults are
/// applied, absent optional fields are normalized to explicit nulls, so a
/// stored record's field set always exactly matches its schema. In `Patch`
/// mode the result contains only the touched fields.
pub fn validate_fields(
    compiled: &CompiledCollection,
    candidate: &Map<String, Value>,
    mode: ValidationMode,
) -> SchemaResult<Map<String, Value>> {
    // Unknown and system fields are rejected up front, first mismatch wins.
    for key in candidate.keys() {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            return Err(SchemaError::validation(key, "system field cannot be written"));
        }
        if compiled.field(key).is_none() {
            return Err(SchemaError::validation(key, "unknown field"));
        }
    }

    let mut validated = Map::new();

    match mode {
        ValidationMode::Create => {
            for field in &compiled.fields {
                let value = match candidate.get(&field.def.name) {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => field.def.default.clone().unwrap_or(Value::Null),
                };
                check_presence_and_value(field, &value)?;
                validated.insert(field.def.name.clone(), value);
            }
        }
        ValidationMode::Patch => {
            for (key, value) in candidate {
                // Unwrap is safe: unknown keys were rejected above.
                let field = compiled.field(key).expect("key checked above");
                check_presence_and_value(field, value)?;
                validated.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(validated)
}

fn check_presence_and_value(field: &CompiledField, value: &Value) -> SchemaResult<()> {
    if value.is_null() {
        if field.def.required {
            return Err(SchemaError::validation(&field.def.name, "required field missing"));
        }
        return Ok(());
    }
    check_value(field, value).map_err(|reason| SchemaError::validation(&field.def.name, reason))
}

/// Type- and constraint-check one non-null value. Returns the failure
/// reason; the caller attaches the field name.
pub fn check_value(field: &CompiledField, value: &Value) -> Result<(), String> {
    match &field.def.kind {
        FieldKind::Text => {
            let text = value
                .as_str()
                .ok_or_else(|| type_error("text", value))?;
            check_length_bounds(field, text.chars().count())?;
            if let Some(pattern) = &field.pattern {
                if !pattern.is_match(text) {
                    return Err(format!("value does not match pattern '{}'", pattern.as_str()));
                }
            }
            Ok(())
        }
        FieldKind::Number => {
            let number = value
                .as_f64()
                .ok_or_else(|| type_error("number", value))?;
            if let Some(min) = numeric_bound(&field.def.min) {
                if number < min {
                    return Err(format!("value {} below minimum {}", number, min));
                }
            }
            if let Some(max) = numeric_bound(&field.def.max) {
                if number > max {
                    return Err(format!("value {} above maximum {}", number, max));
                }
            }
            Ok(())
        }
        FieldKind::Bool => {
            if !value.is_boolean() {
                return Err(type_error("bool", value));
            }
            Ok(())
        }
        FieldKind::Date => {
            let text = value
                .as_str()
                .ok_or_else(|| type_error("date", value))?;
            let parsed = DateTime::parse_from_rfc3339(text)
                .map_err(|_| format!("'{}' is not an RFC3339 timestamp", text))?;
            if let Some(Value::String(min)) = &field.def.min {
                if let Ok(bound) = DateTime::parse_from_rfc3339(min) {
                    if parsed < bound {
                        return Err(format!("timestamp before minimum {}", min));
                    }
                }
            }
            if let Some(Value::String(max)) = &field.def.max {
                if let Ok(bound) = DateTime::parse_from_rfc3339(max) {
                    if parsed > bound {
                        return Err(format!("timestamp after maximum {}", max));
                    }
                }
            }
            Ok(())
        }
        FieldKind::File => {
            let token = value
                .as_str()
                .ok_or_else(|| type_error("file", value))?;
            if token.is_empty() {
                return Err("file reference cannot be empty".into());
            }
            Ok(())
        }
        FieldKind::Json => Ok(()),
        FieldKind::Relation { .. } => {
            if value.as_str().map(|s| !s.is_empty()).unwrap_or(false) {
                Ok(())
            } else {
                Err(type_error("relation id", value))
            }
        }
        FieldKind::List { element } => {
            let items = value
                .as_array()
                .ok_or_else(|| type_error("list", value))?;
            check_length_bounds(field, items.len())?;
            for (index, item) in items.iter().enumerate() {
                check_scalar(*element, item)
                    .map_err(|reason| format!("element {}: {}", index, reason))?;
            }
            Ok(())
        }
    }
}

fn check_scalar(kind: ScalarKind, value: &Value) -> Result<(), String> {
    match kind {
        ScalarKind::Text | ScalarKind::File => value
            .as_str()
            .map(|_| ())
            .ok_or_else(|| type_error(kind.kind_name(), value)),
        ScalarKind::Number => value
            .as_f64()
            .map(|_| ())
            .ok_or_else(|| type_error("number", value)),
        ScalarKind::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(type_error("bool", value))
            }
        }
        ScalarKind::Date => {
            let text = value.as_str().ok_or_else(|| type_error("date", value))?;
            DateTime::parse_from_rfc3339(text)
                .map(|_| ())
                .map_err(|_| format!("'{}' is not an RFC3339 timestamp", text))
        }
    }
}

fn check_length_bounds(field: &CompiledField, length: usize) -> Result<(), String> {
    if let Some(min) = numeric_bound(&field.def.min) {
        if (length as f64) < min {
            return Err(format!("length {} below minimum {}", length, min));
        }
    }
    if let Some(max) = numeric_bound(&field.def.max) {
        if (length as f64) > max {
            return Err(format!("length {} above maximum {}", length, max));
        }
    }
    Ok(())
}

fn numeric_bound(bound: &Option<Value>) -> Option<f64> {
    bound.as_ref().and_then(Value::as_f64)
}

fn type_error(expected: &str, actual: &Value) -> String {
    format!("expected {}, got {}", expected, json_type_name(actual))
}

/// JSON type name for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
