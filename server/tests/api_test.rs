mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, test_app};
use tower::ServiceExt;

#[tokio::test]
async fn base_environment_contains_the_seed() {
    let (app, _dir) = test_app().await;
    let res = get(app, "/base-environment").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["Transcript"]["isBridge"], serde_json::json!(true));
    assert_eq!(
        body["Number"]["methods"]["+"]["primitive"],
        serde_json::json!("NumberAdd")
    );
    assert_eq!(
        body["Object"]["methods"]["printString"]["primitive"],
        serde_json::json!("ObjectPrintString")
    );
}

#[tokio::test]
async fn classes_are_sorted_by_name() {
    let (app, _dir) = test_app().await;
    let res = get(app, "/classes").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let classes: Vec<&str> = body["classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert!(classes.contains(&"Number"));
    assert!(classes.contains(&"BlockClosure"));
    assert!(classes.windows(2).all(|w| w[0] <= w[1]), "{classes:?}");
}

#[tokio::test]
async fn methods_of_a_seed_class_are_listed_sorted() {
    let (app, _dir) = test_app().await;
    let res = get(app, "/methods/Number").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let methods: Vec<&str> = body["methods"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert!(methods.contains(&"+"));
    assert!(methods.contains(&"asString"));
    assert!(methods.windows(2).all(|w| w[0] <= w[1]), "{methods:?}");
}

#[tokio::test]
async fn missing_class_is_404() {
    let (app, _dir) = test_app().await;
    let res = get(app, "/methods/NoSuchClass").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_method_is_404() {
    let (app, _dir) = test_app().await;
    let res = get(app.clone(), "/method/Number/noSuchSelector:").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = get(app, "/method/NoSuchClass/x").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn save_method_validates_its_input() {
    let (app, _dir) = test_app().await;

    let res = post_json(
        app.clone(),
        "/method",
        serde_json::json!({"className": "", "selector": "x", "arguments": [], "body": []}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post_json(
        app.clone(),
        "/method",
        serde_json::json!({"className": "Number", "selector": "", "arguments": [], "body": []}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post_json(
        app.clone(),
        "/method",
        serde_json::json!({"className": "Number", "selector": "x", "arguments": "nope", "body": []}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post_json(
        app,
        "/method",
        serde_json::json!({"className": "Number", "selector": "x", "arguments": [1], "body": []}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_then_fetch_round_trips() {
    let (app, _dir) = test_app().await;

    let method = serde_json::json!({
        "className": "Number",
        "selector": "double:",
        "arguments": ["x"],
        "body": [["^", ["$x", "*", 2]]],
    });

    let res = post_json(app.clone(), "/method", method.clone()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = get(app.clone(), "/method/Number/double:").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["selector"], serde_json::json!("double:"));
    assert_eq!(body["arguments"], serde_json::json!(["x"]));
    assert_eq!(body["body"], serde_json::json!([["^", ["$x", "*", 2]]]));

    // Saving again is an update, not a create.
    let res = post_json(app.clone(), "/method", method).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = get(app, "/methods/Number").await;
    let body = body_json(res).await;
    assert!(body["methods"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("double:")));
}

#[tokio::test]
async fn save_creates_missing_classes() {
    let (app, _dir) = test_app().await;

    let res = post_json(
        app.clone(),
        "/method",
        serde_json::json!({"className": "Point", "selector": "x", "arguments": [], "body": []}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = get(app, "/classes").await;
    let body = body_json(res).await;
    assert!(body["classes"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("Point")));
}

#[tokio::test]
async fn saved_methods_dispatch_after_an_image_reload() {
    let (app, _dir) = test_app().await;

    let res = post_json(
        app.clone(),
        "/method",
        serde_json::json!({
            "className": "Number",
            "selector": "double:",
            "arguments": ["x"],
            "body": [["^", ["$x", "*", 2]]],
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = get(app, "/base-environment").await;
    let blob = body_json(res).await;
    let interp = son_eval::Interpreter::from_image(blob.as_object().unwrap()).unwrap();
    assert_eq!(
        interp.eval_source(r#"[3, "double:", 21]"#).unwrap(),
        son_core::Value::Number(42.0)
    );
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (app, _dir) = test_app().await;
    let res = app
        .oneshot(
            axum::http::Request::builder()
                .method("OPTIONS")
                .uri("/method")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert!(res
        .headers()
        .contains_key("access-control-allow-origin"));
}
