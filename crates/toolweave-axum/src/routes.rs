//! Route definitions and router construction.
//!
//! Three surfaces share one router:
//! - `/mcp`: the protocol endpoint serving the automation tools to external clients
//! - `/bridge`: the WebSocket the browser controller attaches to
//! - `/api/*`: the management API (servers, tools, definitions, events)

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix, for nesting.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Servers API
        .route(
            "/servers",
            get(handlers::servers::list).post(handlers::servers::add),
        )
        .route(
            "/servers/{id}",
            get(handlers::servers::get).delete(handlers::servers::remove),
        )
        .route(
            "/servers/{id}/reconnect",
            post(handlers::servers::reconnect),
        )
        // Tools API
        .route("/tools", get(handlers::tools::list))
        .route("/tools/call", post(handlers::tools::call))
        // Automation definitions API
        .route(
            "/definitions",
            get(handlers::definitions::list).post(handlers::definitions::load),
        )
        .route(
            "/definitions/{name}",
            get(handlers::definitions::get).delete(handlers::definitions::remove),
        )
        // Events (SSE)
        .route("/events", get(handlers::events::stream))
        .route("/health", get(health_check))
}

/// Create the main Axum router.
///
/// # Path Parameter Syntax
/// Axum 0.8 uses brace syntax for path parameters: `{id}`, `{name}`
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/mcp",
            post(handlers::mcp::post)
                .get(handlers::mcp::get)
                .delete(handlers::mcp::delete),
        )
        .route("/bridge", get(handlers::bridge::connect))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
