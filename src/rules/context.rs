//! # Rule Context
//!
//! Everything a rule evaluation may read: the requesting identity's claims,
//! the candidate record (absent for create and list prechecks), and the
//! request query parameters. The context borrows; building one per request
//! costs nothing.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Evaluation context for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleContext<'a> {
    /// Identity claims (`id` plus whatever the token carried).
    /// `None` = anonymous request.
    auth: Option<&'a Map<String, Value>>,
    /// Candidate record as JSON (system fields flattened in).
    record: Option<&'a Value>,
    /// Request query parameters.
    query: Option<&'a HashMap<String, String>>,
}

impl<'a> RuleContext<'a> {
    /// An anonymous context with no record and no query parameters.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach identity claims.
    pub fn with_auth(mut self, claims: &'a Map<String, Value>) -> Self {
        self.auth = Some(claims);
        self
    }

    /// Attach the candidate record.
    pub fn with_record(mut self, record: &'a Value) -> Self {
        self.record = Some(record);
        self
    }

    /// Attach request query parameters.
    pub fn with_query(mut self, query: &'a HashMap<String, String>) -> Self {
        self.query = Some(query);
        self
    }

    /// Identity claims, if authenticated.
    pub fn auth(&self) -> Option<&'a Map<String, Value>> {
        self.auth
    }

    /// Candidate record, if bound.
    pub fn record(&self) -> Option<&'a Value> {
        self.record
    }

    /// Query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&'a str> {
        self.query.and_then(|q| q.get(name)).map(|s| s.as_str())
    }

    /// Rebind the candidate record, keeping auth and query.
    ///
    /// List authorization evaluates one rule against many candidates; this
    /// avoids rebuilding the rest of the context per row.
    pub fn for_record(&self, record: &'a Value) -> Self {
        Self {
            auth: self.auth,
            record: Some(record),
            query: self.query,
        }
    }
}
