//! Shared setup for gateway integration tests.

#![allow(dead_code)]

use std::path::Path;

use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use vibehub::config::{ApiKey, Config};
use vibehub::proxy::{create_router, AppState};

/// Config with every provider pointed at `upstream` and the log in `data_dir`.
///
/// No keys are set; tests add the ones they need.
pub fn test_config(data_dir: &Path, upstream: &str) -> Config {
    let mut config = Config::default();
    config.server.listen = "127.0.0.1:0".to_string();
    config.storage.data_dir = data_dir.to_path_buf();
    config.providers.openai.url = format!("{}/openai/v1/chat/completions", upstream);
    config.providers.anthropic.url = format!("{}/anthropic/v1/chat/completions", upstream);
    config.providers.perplexity.url = format!("{}/perplexity/chat/completions", upstream);
    config.providers.local.url = format!("{}/local/v1/chat/completions", upstream);
    config.providers.gemini.url = format!("{}/v1beta/models/", upstream);
    config
}

pub fn with_key(mut config: Config, provider: vibehub::router::Provider, key: &str) -> Config {
    config.providers.get_mut(provider).api_key = Some(ApiKey::from(key));
    config
}

pub fn app(config: Config) -> axum::Router {
    create_router(AppState::new(config).expect("build state"))
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send one request through the router.
pub async fn send(app: &axum::Router, request: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(request).await.expect("router call")
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 4 * 1_048_576)
        .await
        .expect("read body")
        .to_vec()
}

/// Parse the response body as JSON and return (status_code, json_value).
pub async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = body_bytes(response).await;
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
    (status, json)
}

pub fn trace_header(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("x-trace-id")
        .expect("x-trace-id header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Events recorded for one trace, via the history endpoint.
pub async fn events_for(app: &axum::Router, trace_id: &str) -> Vec<serde_json::Value> {
    let response = send(app, get(&format!("/v1/hub/history?trace_id={}", trace_id))).await;
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    json["data"].as_array().cloned().unwrap_or_default()
}
