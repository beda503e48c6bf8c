//! Tail queries over the event log.

use std::path::Path;

use serde_json::Value;

/// Hard cap on events returned by one query.
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Limit used when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Resolve a requested limit against the default and the cap.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
}

/// Select events from raw log content.
///
/// Each line is parsed as plain JSON and returned as stored; lines that are
/// not JSON are dropped. Without a trace id the last `limit` (at most 500)
/// lines are parsed. With one, only lines carrying `"id":"<trace_id>"` whose
/// parsed `id` equals it exactly are kept, and the last `limit` of those are
/// returned. Results stay in file order.
pub fn parse_history(content: &str, limit: usize, trace_id: Option<&str>) -> Vec<Value> {
    let limit = limit.min(MAX_HISTORY_LIMIT);
    let content = content.trim();
    if content.is_empty() || limit == 0 {
        return Vec::new();
    }

    let parse = |line: &str| serde_json::from_str::<Value>(line.trim_end_matches('\r')).ok();

    match trace_id.filter(|t| !t.is_empty()) {
        None => {
            let lines: Vec<&str> = content.split('\n').collect();
            let start = lines.len().saturating_sub(limit);
            lines[start..].iter().filter_map(|line| parse(*line)).collect()
        }
        Some(trace_id) => {
            let needle = format!("\"id\":{}", Value::from(trace_id));
            let mut events: Vec<Value> = content
                .rsplit('\n')
                .filter(|line| line.contains(&needle))
                .filter_map(parse)
                .filter(|event| event.get("id").and_then(Value::as_str) == Some(trace_id))
                .take(limit)
                .collect();
            events.reverse();
            events
        }
    }
}

/// Read the log file and run [`parse_history`] over it.
///
/// A missing or unreadable file yields an empty list.
pub async fn read_history(path: &Path, limit: usize, trace_id: Option<&str>) -> Vec<Value> {
    match tokio::fs::read(path).await {
        Ok(bytes) => parse_history(&String::from_utf8_lossy(&bytes), limit, trace_id),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read history log");
            Vec::new()
        }
    }
}
