//! History endpoint: recent events from the log, optionally for one trace.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::server::AppState;
use crate::storage::{clamp_limit, read_history};

/// Query parameters for GET /v1/hub/history.
///
/// Read from a plain string map so repeated keys and malformed values never
/// reject the request; a malformed `limit` falls back to the default.
#[derive(Debug, Default)]
pub struct HistoryQuery {
    pub limit: Option<String>,
    pub trace_id: Option<String>,
}

impl HistoryQuery {
    pub fn from_params(mut params: HashMap<String, String>) -> Self {
        Self {
            limit: params.remove("limit"),
            trace_id: params.remove("trace_id"),
        }
    }

    pub fn limit(&self) -> usize {
        clamp_limit(self.limit.as_deref().and_then(|l| l.trim().parse().ok()))
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref().filter(|t| !t.is_empty())
    }
}

/// Handle GET /v1/hub/history
pub async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = HistoryQuery::from_params(params);
    let limit = query.limit();
    let events = read_history(state.events.path(), limit, query.trace_id()).await;

    tracing::debug!(
        limit,
        trace_id = query.trace_id().unwrap_or(""),
        returned = events.len(),
        "History query"
    );

    Json(json!({
        "object": "list",
        "data": events
    }))
}
