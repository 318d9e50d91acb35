//! lodestone - A runtime-schema, self-hostable record backend
//!
//! Operators define collections (schemas) at runtime; the engine serves
//! generic CRUD over them, enforces per-operation access rules written in a
//! small expression language, and pushes committed mutations to live
//! subscribers over WebSockets.

pub mod auth;
pub mod cli;
pub mod config;
pub mod events;
pub mod executor;
pub mod http;
pub mod observability;
pub mod rules;
pub mod schema;
pub mod store;
