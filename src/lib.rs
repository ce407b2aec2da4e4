pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::{
    config::StorageBackend,
    handlers::{docs, health, metrics, orders, user, wallpapers, AppState},
};

pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/protected/gen-wallpaper", post(wallpapers::gen_wallpaper))
        .route("/api/get-wallpapers", post(wallpapers::get_wallpapers))
        .route("/api/get-user-info", post(user::get_user_info))
        .route("/api/checkout", post(orders::checkout))
        .route("/api/pay-success", post(orders::pay_success));

    let mut app = Router::new()
        .merge(api_routes)
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(docs::create_docs_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::metrics_middleware,
        ));

    // Locally stored assets are served from the same process.
    if state.config.storage_backend == StorageBackend::Local {
        app = app.nest_service("/assets", ServeDir::new(&state.config.local_storage_dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}
