use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cncserver_rs::web::api::create_router;
use cncserver_rs::{Config, LoopbackChannel, Plotter};
use serde_json::{json, Value};
use tower::ServiceExt; // for .oneshot()

fn app() -> (Router, LoopbackChannel) {
    let channel = LoopbackChannel::new();
    let handle = Plotter::new(Arc::new(Config::default()), Arc::new(channel.clone())).spawn(16);
    (create_router(handle), channel)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test(start_paused = true)]
async fn get_initial_pen() {
    let (app, _channel) = app();
    let (status, pen) = send(&app, "GET", "/pen", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pen, json!({"x": 0.0, "y": 0.0, "state": 0, "tool": null, "distanceCounter": 0.0}));
}

#[tokio::test(start_paused = true)]
async fn put_pen_moves_and_reports() {
    let (app, channel) = app();
    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"x": 50, "y": 50}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((pen["x"].as_f64(), pen["y"].as_f64()), (Some(7540.0), Some(3600.0)));
    assert_eq!(channel.sent(), vec!["SM,2785,-7540,3600\r"]);

    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"state": 1, "ignoreTimeout": true}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(pen["state"], 1);
}

#[tokio::test(start_paused = true)]
async fn reset_counter_via_put() {
    let (app, _channel) = app();
    send(&app, "PUT", "/pen", Some(json!({"state": 1}))).await;
    send(&app, "PUT", "/pen", Some(json!({"x": 10, "y": 0}))).await;
    let (_, pen) = send(&app, "GET", "/pen", None).await;
    assert!(pen["distanceCounter"].as_f64().unwrap() > 0.0);

    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"resetCounter": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pen["distanceCounter"].as_f64(), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn noop_is_not_an_error() {
    let (app, channel) = app();
    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"x": 0, "y": 0, "park": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pen["x"].as_f64(), Some(0.0));

    let (status, _) = send(&app, "DELETE", "/pen", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(channel.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn put_pen_normalizes_loose_values() {
    let (app, channel) = app();
    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"state": 0.5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pen["state"], 0);
    assert!(channel.sent().is_empty());

    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"state": "1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pen["state"], 1);
    assert_eq!(channel.sent(), vec!["SP,0\r"]);

    let (status, pen) = send(&app, "PUT", "/pen", Some(json!({"x": "50", "y": "50"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((pen["x"].as_f64(), pen["y"].as_f64()), (Some(7540.0), Some(3600.0)));
    assert!(channel.sent()[1].ends_with(",-7540,3600\r"));
}

#[tokio::test(start_paused = true)]
async fn malformed_pen_body_keeps_status_shape() {
    let (app, channel) = app();
    let request = Request::builder()
        .method("PUT")
        .uri("/pen")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["status"].is_string());
    assert!(channel.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn write_failure_is_500() {
    let (app, channel) = app();
    channel.fail_matching("SM");
    let (status, body) = send(&app, "PUT", "/pen", Some(json!({"x": 10, "y": 10}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"status": "Error"}));

    channel.fail_matching("EM");
    let (status, body) = send(&app, "DELETE", "/motors", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"status": "Error"}));
}

#[tokio::test(start_paused = true)]
async fn park_with_delete() {
    let (app, _channel) = app();
    send(&app, "PUT", "/pen", Some(json!({"x": 30, "y": 70}))).await;
    let (status, pen) = send(&app, "DELETE", "/pen", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((pen["x"].as_f64(), pen["y"].as_f64(), pen["state"].as_u64()), (Some(0.0), Some(0.0), Some(0)));
}

#[tokio::test(start_paused = true)]
async fn motors_disable_on_get_and_delete() {
    let (app, channel) = app();
    for method in ["GET", "DELETE"] {
        let (status, body) = send(&app, method, "/motors", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "Disabled"}));
    }
    assert_eq!(channel.sent(), vec!["EM,0,0\r", "EM,0,0\r"]);
}

#[tokio::test(start_paused = true)]
async fn tools_list_and_change() {
    let (app, _channel) = app();
    let (status, body) = send(&app, "GET", "/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tools"][0], "water0");
    assert_eq!(body["tools"].as_array().unwrap().len(), 11);

    let (status, body) = send(&app, "PUT", "/tools/water1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "Tool changed to water1"}));
    let (_, pen) = send(&app, "GET", "/pen", None).await;
    assert_eq!(pen["tool"], "water1");

    let (status, body) = send(&app, "PUT", "/tools/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "Tool not found"}));
}

#[tokio::test(start_paused = true)]
async fn unsupported_method_is_405() {
    let (app, _channel) = app();
    let (status, _) = send(&app, "POST", "/pen", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, "DELETE", "/tools", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
