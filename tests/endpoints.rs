//! Integration tests for the local endpoints: health, models, history,
//! fallbacks and body validation. None of these reach an upstream.

mod common;

use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::json;

use common::{app, get, parse_body, send, test_config};
use vibehub::router::Provider;
use vibehub::storage::Event;

const NOWHERE: &str = "http://127.0.0.1:1";

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path(), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/health")).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"ok": true}));
}

#[tokio::test]
async fn test_models_list() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path(), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/v1/models")).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["object"], "list");

    let data = json["data"].as_array().unwrap();
    let pairs: Vec<(&str, &str)> = data
        .iter()
        .map(|m| (m["id"].as_str().unwrap(), m["owned_by"].as_str().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("gpt-5.2", "openai"),
            ("claude-3.5-sonnet", "anthropic"),
            ("sonar-pro", "perplexity"),
            ("gemini-1.5-pro", "google"),
            ("local-llama3", "local"),
        ]
    );
    assert!(data.iter().all(|m| m["object"] == "model"));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path(), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/v1/embeddings")).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": "Not found"}));
}

#[tokio::test]
async fn test_wrong_method_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path(), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/v1/chat/completions")).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": "Not found"}));

    let request = Request::builder()
        .method("POST")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, _) = parse_body(send(&app, request).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_is_400_and_not_logged() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path(), NOWHERE));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from("{\"model\": \"gpt-5.2\", "))
        .unwrap();
    let response = send(&app, request).await;
    assert!(response.headers().get("x-trace-id").is_none());

    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "Invalid JSON body"}));

    let (_, history) = parse_body(send(&app, get("/v1/hub/history")).await).await;
    assert_eq!(history, json!({"object": "list", "data": []}));
}

fn write_log(dir: &std::path::Path, lines: &[String]) {
    let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    std::fs::write(dir.join("history.jsonl"), content).unwrap();
}

fn event_line(id: &str) -> String {
    serde_json::to_string(&Event::error(id, Provider::OpenAi, "boom")).unwrap()
}

#[tokio::test]
async fn test_history_limit_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..600).map(|i| event_line(&format!("t{}", i))).collect();
    write_log(dir.path(), &lines);
    let app = app(test_config(dir.path(), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/v1/hub/history?limit=1000")).await).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 500);
    assert_eq!(data[0]["id"], "t100");
    assert_eq!(data[499]["id"], "t599");

    // Default limit
    let (_, json) = parse_body(send(&app, get("/v1/hub/history")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 100);

    // Unparseable limit falls back to the default
    let (_, json) = parse_body(send(&app, get("/v1/hub/history?limit=many")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 100);

    let (_, json) = parse_body(send(&app, get("/v1/hub/history?limit=3")).await).await;
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["t597", "t598", "t599"]);
}

#[tokio::test]
async fn test_history_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        &[
            event_line("a"),
            "{\"id\":\"b\",\"ts\":".to_string(),
            "garbage".to_string(),
            event_line("c"),
        ],
    );
    let app = app(test_config(dir.path(), NOWHERE));

    let (_, json) = parse_body(send(&app, get("/v1/hub/history")).await).await;
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a", "c"]);
}

#[tokio::test]
async fn test_history_trace_filter() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        &[event_line("one"), event_line("two"), event_line("one")],
    );
    let app = app(test_config(dir.path(), NOWHERE));

    let (_, json) = parse_body(send(&app, get("/v1/hub/history?trace_id=one")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (status, json) =
        parse_body(send(&app, get("/v1/hub/history?trace_id=unknown")).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"object": "list", "data": []}));

    let (_, json) = parse_body(send(&app, get("/v1/hub/history?trace_id=")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_without_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(&dir.path().join("fresh"), NOWHERE));

    let (status, json) = parse_body(send(&app, get("/v1/hub/history")).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"object": "list", "data": []}));
}

#[tokio::test]
async fn test_history_returns_lines_as_stored() {
    let dir = tempfile::tempdir().unwrap();
    let stored = json!({
        "id": "tool-turn",
        "ts": "2026-03-01T10:00:00.000Z",
        "type": "request",
        "provider": "openai",
        "model": "gpt-5.2",
        "messages": [
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": null, "tool_calls": [{"id": "call_1"}]}
        ],
        "stream": false,
        "meta": {"max_tokens": 1000.0}
    });
    write_log(dir.path(), &[stored.to_string(), event_line("other")]);
    let app = app(test_config(dir.path(), NOWHERE));

    let (_, json) = parse_body(send(&app, get("/v1/hub/history?trace_id=tool-turn")).await).await;
    assert_eq!(json["data"], json!([stored.clone()]));

    let (_, json) = parse_body(send(&app, get("/v1/hub/history")).await).await;
    assert_eq!(json["data"][0], stored);
}

#[tokio::test]
async fn test_history_repeated_query_keys() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..5).map(|i| event_line(&format!("t{}", i))).collect();
    write_log(dir.path(), &lines);
    let app = app(test_config(dir.path(), NOWHERE));

    let response = send(&app, get("/v1/hub/history?limit=1&limit=2")).await;
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["object"], "list");
    let len = json["data"].as_array().unwrap().len();
    assert!(len == 1 || len == 2, "{}", len);
}

#[tokio::test]
async fn test_history_trace_limit_counts_exact_matches_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = vec![event_line("abc"), event_line("abc")];
    // Newer lines that mention the id inside another event
    for i in 0..4 {
        lines.push(json!({"id": format!("n{}", i), "parent": {"id": "abc"}}).to_string());
    }
    write_log(dir.path(), &lines);
    let app = app(test_config(dir.path(), NOWHERE));

    let (_, json) =
        parse_body(send(&app, get("/v1/hub/history?trace_id=abc&limit=2")).await).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|e| e["id"] == "abc"));
}
