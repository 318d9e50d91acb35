//! # HTTP Server
//!
//! Router assembly and serving. API routes live under `/api`; the health
//! probe stays at the root.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::HttpConfig;
use crate::observability::{log, Severity};

use super::collection_routes::collection_routes;
use super::realtime_routes::realtime_routes;
use super::record_routes::record_routes;
use super::state::AppState;

/// The engine's HTTP server.
pub struct HttpServer {
    config: HttpConfig,
    router: Router,
}

impl HttpServer {
    /// Build the server over shared state.
    pub fn new(config: HttpConfig, state: Arc<AppState>) -> Self {
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    fn build_router(config: &HttpConfig, state: Arc<AppState>) -> Router {
        // Permissive CORS when no origins are configured (development);
        // explicit origin list otherwise.
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let api = Router::new()
            .merge(collection_routes())
            .merge(record_routes())
            .merge(realtime_routes());

        Router::new()
            .route("/healthz", get(health))
            .nest("/api", api)
            .layer(cors)
            .with_state(state)
    }

    /// The router (for in-process testing).
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        log(
            Severity::Info,
            "server.start",
            &[("addr", &addr.to_string())],
        );
        axum::serve(listener, self.router).await
    }
}

async fn health() -> &'static str {
    "ok"
}
