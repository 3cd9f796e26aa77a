pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::{routing::get, Extension, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/openings/positions", get(routes::positions::get_repeated_positions))
        .route("/api/openings/leaks/ws", get(routes::leaks_ws::ws_handler))
        .layer(Extension(state))
        .layer(cors)
}
