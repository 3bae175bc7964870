use axum::extract::ws::WebSocket;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::{store, AppState};

pub async fn base_environment(State(state): State<Arc<AppState>>) -> Response {
    match store::base_environment(&state.db).await {
        Ok(blob) => Json(serde_json::Value::Object(blob)).into_response(),
        Err(e) => internal_error("base environment", e),
    }
}

pub async fn list_classes(State(state): State<Arc<AppState>>) -> Response {
    match store::class_names(&state.db).await {
        Ok(classes) => Json(serde_json::json!({ "classes": classes })).into_response(),
        Err(e) => internal_error("list classes", e),
    }
}

pub async fn list_methods(
    State(state): State<Arc<AppState>>,
    Path(class_name): Path<String>,
) -> Response {
    let class_id = match store::class_id(&state.db, &class_name).await {
        Ok(Some(id)) => id,
        Ok(None) => return not_found(format!("class not found: {class_name}")),
        Err(e) => return internal_error("list methods", e),
    };
    match store::method_selectors(&state.db, class_id).await {
        Ok(methods) => Json(serde_json::json!({ "methods": methods })).into_response(),
        Err(e) => internal_error("list methods", e),
    }
}

pub async fn get_method(
    State(state): State<Arc<AppState>>,
    Path((class_name, selector)): Path<(String, String)>,
) -> Response {
    match store::find_method(&state.db, &class_name, &selector).await {
        Ok(Some(method)) => Json(serde_json::json!({
            "selector": method.selector,
            "arguments": method.arguments,
            "body": method.body,
        }))
        .into_response(),
        Ok(None) => not_found(format!("method not found: {class_name}>>{selector}")),
        Err(e) => internal_error("get method", e),
    }
}

#[derive(Deserialize)]
pub struct SaveMethodRequest {
    #[serde(rename = "className")]
    pub class_name: String,
    pub selector: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub body: serde_json::Value,
}

pub async fn save_method(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveMethodRequest>,
) -> Response {
    let arguments = match validate(&req) {
        Ok(arguments) => arguments,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response()
        }
    };
    match store::save_method(&state.db, &req.class_name, &req.selector, &arguments, &req.body)
        .await
    {
        Ok(store::SaveOutcome::Created) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "ok": true })),
        )
            .into_response(),
        Ok(store::SaveOutcome::Updated) => {
            (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => internal_error("save method", e),
    }
}

fn validate(req: &SaveMethodRequest) -> Result<Vec<String>, String> {
    if req.class_name.trim().is_empty() {
        return Err("className must be a non-empty string".to_string());
    }
    if req.selector.is_empty() {
        return Err("selector must be a non-empty string".to_string());
    }
    let Some(items) = req.arguments.as_array() else {
        return Err("arguments must be an array of strings".to_string());
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| "arguments must be an array of strings".to_string())
        })
        .collect()
}

/// Upgrade path reserved for push notifications; for now the socket is
/// just held open and inbound frames are ignored.
pub async fn ws(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    while let Some(Ok(_)) = socket.recv().await {}
}

fn not_found(msg: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}

fn internal_error(what: &str, e: sqlx::Error) -> Response {
    tracing::error!("{what}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "database error" })),
    )
        .into_response()
}
