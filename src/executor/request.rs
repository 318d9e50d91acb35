//! # Request Types

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::auth::Identity;

/// Per-request context: who is asking, with what query parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Verified identity; `None` = anonymous
    pub identity: Option<Identity>,
    /// Request query parameters, exposed to rules as `@request.query.*`
    pub query: HashMap<String, String>,
}

impl RequestContext {
    /// An anonymous context with no query parameters.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for a verified identity.
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            query: HashMap::new(),
        }
    }

    /// Attach query parameters.
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Whether the requester is an administrator.
    pub fn is_admin(&self) -> bool {
        self.identity.as_ref().map(|i| i.is_admin).unwrap_or(false)
    }
}

/// Client-facing list parameters, as received from the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Filter expression source
    pub filter: Option<String>,
    /// Sort string, e.g. `-created,title`
    pub sort: Option<String>,
    /// Opaque cursor from the previous page
    pub cursor: Option<String>,
    /// Page size
    pub limit: Option<usize>,
    /// Relation expansion paths, comma-separated
    pub expand: Option<String>,
}

/// One page of listed records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult {
    /// Flattened record JSONs in sort order
    pub items: Vec<Value>,
    /// Cursor for the next page, absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_not_admin() {
        assert!(!RequestContext::anonymous().is_admin());
    }

    #[test]
    fn test_admin_context() {
        let ctx = RequestContext::authenticated(Identity::admin("root"));
        assert!(ctx.is_admin());
    }

    #[test]
    fn test_list_result_omits_absent_cursor() {
        let result = ListResult {
            items: vec![],
            cursor: None,
        };
        let wire = serde_json::to_value(&result).unwrap();
        assert!(wire.get("cursor").is_none());
    }
}
