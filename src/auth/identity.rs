//! # Request Identity

use serde_json::{Map, Value};

/// The authenticated requester, as rules see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Stable subject id
    pub id: String,
    /// Admins bypass access rules explicitly and may run schema operations
    pub is_admin: bool,
    /// Claim map exposed to rules as `@request.auth.*` (includes `id`)
    pub claims: Map<String, Value>,
}

impl Identity {
    /// Identity from a subject id and extra claims. The `id` claim is
    /// always present and always wins over a colliding custom claim.
    pub fn new(id: impl Into<String>, is_admin: bool, extra: Map<String, Value>) -> Self {
        let id = id.into();
        let mut claims = extra;
        claims.insert("id".to_string(), Value::String(id.clone()));
        claims.insert("admin".to_string(), Value::Bool(is_admin));
        Self {
            id,
            is_admin,
            claims,
        }
    }

    /// An administrator identity (used by trusted local tooling and tests).
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, true, Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_claim_always_present() {
        let mut extra = Map::new();
        extra.insert("role".to_string(), json!("editor"));
        extra.insert("id".to_string(), json!("spoofed"));

        let identity = Identity::new("u1", false, extra);
        assert_eq!(identity.claims["id"], "u1");
        assert_eq!(identity.claims["role"], "editor");
        assert_eq!(identity.claims["admin"], false);
    }

    #[test]
    fn test_admin_constructor() {
        let identity = Identity::admin("root");
        assert!(identity.is_admin);
        assert_eq!(identity.claims["admin"], true);
    }
}
