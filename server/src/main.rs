use son_server::{build_router, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = son_server::config::Config::from_env();

    // Ensure the data directory exists before connecting
    std::fs::create_dir_all("data").ok();

    let db = son_server::store::open(&config.database_url)
        .await
        .expect("Failed to open the method store");
    son_server::store::seed_defaults(&db)
        .await
        .expect("Failed to seed base image");

    let state = Arc::new(AppState { db, config });
    let addr = format!("{}:{}", state.config.host, state.config.port);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("son-server listening on {}", addr);
    axum::serve(listener, app).await.unwrap();
}
