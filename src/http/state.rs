//! # Shared HTTP State

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::auth::{Identity, TokenVerifier};
use crate::events::EventBus;
use crate::executor::{CrudExecutor, RequestContext};
use crate::observability::{log, Severity};

/// State shared by every handler.
pub struct AppState {
    pub executor: Arc<CrudExecutor>,
    pub bus: Arc<EventBus>,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(executor: Arc<CrudExecutor>, bus: Arc<EventBus>, verifier: TokenVerifier) -> Self {
        Self {
            executor,
            bus,
            verifier,
        }
    }

    /// Resolve the request identity from a bearer token.
    ///
    /// Absent and unverifiable tokens both yield anonymous: rules decide
    /// what anonymous requests may do, fail-closed. Failed verifications
    /// are logged so a misconfigured client is visible to the operator.
    pub fn identity_from_token(&self, token: Option<&str>) -> Option<Identity> {
        let token = token?;
        match self.verifier.verify(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                log(
                    Severity::Warn,
                    "auth.token_rejected",
                    &[("reason", &e.to_string())],
                );
                None
            }
        }
    }

    /// Resolve the request identity from headers.
    pub fn identity_from_headers(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        self.identity_from_token(token)
    }

    /// Build a request context from headers and query parameters.
    pub fn request_context(
        &self,
        headers: &HeaderMap,
        query: HashMap<String, String>,
    ) -> RequestContext {
        RequestContext {
            identity: self.identity_from_headers(headers),
            query,
        }
    }
}
