//! # Bearer Token Verification
//!
//! HS256 verification of tokens issued by the external auth collaborator.
//! Claims: `sub` (required, becomes the identity id), `exp` (required),
//! `admin` (optional bool), everything else is passed through to the rule
//! language as `@request.auth.*`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::errors::{AuthError, AuthResult};
use super::identity::Identity;

/// Claims stripped from the rule-visible claim map; they are token
/// mechanics, not identity attributes.
const RESERVED_CLAIMS: &[&str] = &["sub", "exp", "iat", "nbf", "iss", "aud"];

/// Verifies bearer tokens against the shared secret.
pub struct TokenVerifier {
    key: Option<DecodingKey>,
}

impl TokenVerifier {
    /// Verifier over the configured secret. An empty secret disables
    /// verification entirely (every token is rejected, anonymous remains).
    pub fn new(secret: &str) -> Self {
        Self {
            key: if secret.is_empty() {
                None
            } else {
                Some(DecodingKey::from_secret(secret.as_bytes()))
            },
        }
    }

    /// Verify a token and build the request identity.
    pub fn verify(&self, token: &str) -> AuthResult<Identity> {
        let key = self.key.as_ref().ok_or(AuthError::NotConfigured)?;

        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Map<String, Value>>(token, key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        let sub = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidToken("missing sub claim".to_string()))?
            .to_string();
        let is_admin = claims
            .get("admin")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let extra: Map<String, Value> = claims
            .into_iter()
            .filter(|(key, _)| !RESERVED_CLAIMS.contains(&key.as_str()) && key != "admin")
            .collect();

        Ok(Identity::new(sub, is_admin, extra))
    }
}
