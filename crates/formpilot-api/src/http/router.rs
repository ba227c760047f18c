//! Axum router configuration with middleware.
//!
//! All routes live under `/api/`. Middleware: CORS (origins from
//! configuration, `*` in development) and request tracing.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/schemas", get(handlers::schema::list_schemas))
        .route("/schemas/{filename}", get(handlers::schema::get_schema))
        .route("/sessions/reset", post(handlers::session::reset_session))
        .route("/health", get(handlers::health::health_check));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS from the comma-separated origin list; `*` allows any origin.
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
