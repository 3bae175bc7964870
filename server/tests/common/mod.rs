use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use son_server::{build_router, AppState};

/// A router over a fresh seeded database in a temp directory.
pub async fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let db = son_server::store::open(&db_url).await.unwrap();
    son_server::store::seed_defaults(&db).await.unwrap();

    let config = son_server::config::Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: db_url,
    };

    let state = Arc::new(AppState { db, config });
    let app = build_router(state);
    (app, dir)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
