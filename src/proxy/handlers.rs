//! HTTP request handlers.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde_json::{json, Value};

use super::server::{AppState, TraceId, TRACE_ID_HEADER};
use super::stream;
use super::types::ChatCompletionRequest;
use super::upstream::{self, UpstreamReply};
use crate::error::{Error, Result};
use crate::router::{select_provider, Provider};
use crate::storage::Event;

/// Models advertised by GET /v1/models, with their owner label.
const ADVERTISED_MODELS: [(&str, &str); 5] = [
    ("gpt-5.2", "openai"),
    ("claude-3.5-sonnet", "anthropic"),
    ("sonar-pro", "perplexity"),
    ("gemini-1.5-pro", "google"),
    ("local-llama3", "local"),
];

/// Parse a completions body. Only malformed JSON is rejected.
fn parse_request(body: Bytes) -> Result<ChatCompletionRequest> {
    ChatCompletionRequest::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejecting completions body");
        Error::BadRequest("Invalid JSON body".to_string())
    })
}

fn attach_trace_id(response: &mut Response, trace_id: &TraceId) {
    response.headers_mut().insert(
        HeaderName::from_static(TRACE_ID_HEADER),
        trace_id.header_value(),
    );
}

/// JSON response whose body is the exact bytes the upstream sent.
fn raw_json_response(status: StatusCode, body: Bytes, trace_id: &TraceId) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    attach_trace_id(&mut response, trace_id);
    response
}

fn json_response(status: StatusCode, body: Value, trace_id: &TraceId) -> Response {
    let mut response = (status, Json(body)).into_response();
    attach_trace_id(&mut response, trace_id);
    response
}

/// Log a failed call and build the 500 reply.
///
/// Configuration errors report their own message; anything that went wrong
/// talking to the upstream is reported as "Upstream failure". Both carry the
/// trace id so the caller can find the matching error event.
fn failure_response(state: &AppState, provider: Provider, trace_id: &TraceId, error: Error) -> Response {
    let message = error.to_string();
    tracing::error!(trace_id = %trace_id, provider = %provider, error = %message, "Chat completion failed");
    state
        .events
        .append(&Event::error(trace_id.as_str(), provider, message.clone()));

    let public = match error {
        Error::MissingApiKey { .. } => message,
        _ => "Upstream failure".to_string(),
    };
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": public, "traceId": trace_id.as_str() }),
        trace_id,
    )
}

/// Read a complete upstream body and check that it is JSON.
async fn read_json_body(response: reqwest::Response) -> Result<(StatusCode, Bytes, Value)> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let data: Value = serde_json::from_slice(&bytes).map_err(|e| {
        Error::InvalidUpstreamBody(format!("status {} with non-JSON body: {}", status, e))
    })?;
    Ok((status, bytes, data))
}

/// Hand the upstream body to the relay.
///
/// A transport error mid-stream is logged as an error event and ends the relay.
fn relay_upstream(
    state: &AppState,
    provider: Provider,
    trace_id: &TraceId,
    response: reqwest::Response,
) -> Response {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let events = state.events.clone();
    let id = trace_id.to_string();

    let body = response.bytes_stream().inspect_err(move |e| {
        tracing::error!(trace_id = %id, provider = %provider, error = %e, "Error streaming from provider");
        events.append(&Event::error(
            id.clone(),
            provider,
            format!("Stream interrupted: {}", e),
        ));
    });

    stream::relay(status, content_type, trace_id, Some(body))
}

/// Handle POST /v1/chat/completions
pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let provider = select_provider(request.model());
    let trace_id = TraceId::new();
    let wants_stream = request.wants_stream();

    tracing::info!(
        trace_id = %trace_id,
        model = %request.model(),
        provider = %provider,
        stream = wants_stream,
        "Received chat completion request"
    );

    state
        .events
        .append(&Event::request(trace_id.as_str(), provider, &request));

    let reply = upstream::dispatch(
        &state.http_client,
        &state.config.providers,
        provider,
        &request,
    )
    .await;

    match reply {
        Ok(UpstreamReply::Normalized { status, body }) => {
            let data = serde_json::to_value(&body).unwrap_or(Value::Null);
            state.events.append(&Event::response(
                trace_id.as_str(),
                provider,
                status.as_u16(),
                data.clone(),
            ));
            json_response(status, data, &trace_id)
        }
        Ok(UpstreamReply::Raw(response)) if wants_stream && provider.supports_relay() => {
            tracing::info!(trace_id = %trace_id, status = %response.status(), "Relaying stream");
            relay_upstream(&state, provider, &trace_id, response)
        }
        Ok(UpstreamReply::Raw(response)) => match read_json_body(response).await {
            Ok((status, bytes, data)) => {
                tracing::info!(trace_id = %trace_id, status = %status, "Provider responded");
                state.events.append(&Event::response(
                    trace_id.as_str(),
                    provider,
                    status.as_u16(),
                    data,
                ));
                raw_json_response(status, bytes, &trace_id)
            }
            Err(e) => failure_response(&state, provider, &trace_id, e),
        },
        Err(e) => failure_response(&state, provider, &trace_id, e),
    }
}

/// Handle GET /v1/models - static list of advertised models
pub async fn list_models() -> impl IntoResponse {
    let data: Vec<Value> = ADVERTISED_MODELS
        .iter()
        .map(|(id, owner)| {
            json!({
                "id": id,
                "object": "model",
                "owned_by": owner,
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "data": data
    }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Fallback for unknown routes and methods.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_body_as_empty_request() {
        let request = parse_request(Bytes::new()).unwrap();
        assert_eq!(request.model(), "");
        let request = parse_request(Bytes::from_static(b"  \n")).unwrap();
        assert!(request.messages().is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_request(Bytes::from_static(b"{\"model\": ")).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(err.to_string(), "Invalid JSON body");
    }

    #[test]
    fn test_parse_accepts_any_well_formed_json() {
        assert!(parse_request(Bytes::from_static(b"[1, 2]")).is_ok());
        let request = parse_request(Bytes::from_static(b"{\"stream\": \"yes\", \"model\": 5}")).unwrap();
        assert!(request.wants_stream());
        assert_eq!(request.model(), "");
    }

    #[test]
    fn test_advertised_models_route_to_their_owner() {
        for (id, owner) in ADVERTISED_MODELS {
            let provider = select_provider(id);
            let expected = if owner == "google" { "gemini" } else { owner };
            assert_eq!(provider.as_str(), expected, "model: {}", id);
        }
    }

    #[test]
    fn test_raw_json_response_keeps_bytes_and_status() {
        let trace_id = TraceId::new();
        let response = raw_json_response(
            StatusCode::TOO_MANY_REQUESTS,
            Bytes::from_static(b"{\"error\":{\"message\":\"slow\"}}"),
            &trace_id,
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get("x-trace-id").unwrap(),
            trace_id.as_str()
        );
    }
}
