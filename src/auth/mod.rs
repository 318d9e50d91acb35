//! # Identity Boundary
//!
//! Token issuance belongs to the external auth collaborator; this module
//! only verifies bearer tokens that collaborator signed (HS256, shared
//! secret) and turns them into the request identity that rules see as
//! `@request.auth`. An absent or unverifiable token yields the anonymous
//! identity; rules decide what anonymous requests may do, fail-closed.

mod errors;
mod identity;
mod token;

pub use errors::{AuthError, AuthResult};
pub use identity::Identity;
pub use token::TokenVerifier;
