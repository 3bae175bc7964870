pub mod api;
pub mod config;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub db: SqlitePool,
    pub config: config::Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/base-environment", get(api::base_environment))
        .route("/classes", get(api::list_classes))
        .route("/methods/{class_name}", get(api::list_methods))
        .route("/method/{class_name}/{selector}", get(api::get_method))
        .route("/method", post(api::save_method))
        // Reserved for environment push notifications
        .route("/ws", get(api::ws))
        // The editor runs on a different origin; answer preflights permissively
        .layer(CorsLayer::permissive())
        .with_state(state)
}
