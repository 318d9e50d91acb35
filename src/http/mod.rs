//! # HTTP Surface
//!
//! The axum REST API and realtime WebSocket channel over the engine.
//! Handlers stay thin: extract identity and parameters, call the executor,
//! translate the result. All policy lives below this layer.

mod collection_routes;
mod problem;
mod realtime_routes;
mod record_routes;
mod server;
mod state;

pub use problem::{ApiError, ProblemDetail};
pub use server::HttpServer;
pub use state::AppState;
