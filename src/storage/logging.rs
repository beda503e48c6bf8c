//! Event records and the append-only JSONL writer.

use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::HISTORY_FILE;
use crate::proxy::types::{ChatCompletionRequest, GenerationMeta};
use crate::router::Provider;

/// One immutable record in the event log.
///
/// Serialized as a single JSON object: `id`, `ts`, `type`, `provider`, then
/// the type-specific payload. Lines are read back as plain JSON, never
/// through this type, so older or hand-written lines survive queries.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Trace id shared by every event of one call
    pub id: String,
    /// RFC 3339 UTC timestamp
    pub ts: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Type-specific payload of an [`Event`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    Request {
        provider: Provider,
        model: String,
        messages: Value,
        stream: bool,
        meta: GenerationMeta,
    },
    Response {
        provider: Provider,
        status: u16,
        data: Value,
    },
    Error {
        provider: Provider,
        error: String,
    },
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl Event {
    /// Record of an inbound call, written before the upstream is contacted.
    pub fn request(id: impl Into<String>, provider: Provider, request: &ChatCompletionRequest) -> Self {
        Self {
            id: id.into(),
            ts: now_ts(),
            kind: EventKind::Request {
                provider,
                model: request.model().to_string(),
                messages: request.logged_messages(),
                stream: request.wants_stream(),
                meta: request.meta(),
            },
        }
    }

    pub fn response(id: impl Into<String>, provider: Provider, status: u16, data: Value) -> Self {
        Self {
            id: id.into(),
            ts: now_ts(),
            kind: EventKind::Response {
                provider,
                status,
                data,
            },
        }
    }

    pub fn error(id: impl Into<String>, provider: Provider, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ts: now_ts(),
            kind: EventKind::Error {
                provider,
                error: error.into(),
            },
        }
    }
}

/// Append-only writer for `<data_dir>/history.jsonl`.
///
/// Appends are synchronous and unlocked: each event is one `write_all` of a
/// complete line on a file opened in append mode. Only one process should
/// write a given data directory.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Open the log inside `data_dir`, creating the directory tree if needed.
    pub fn open(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(HISTORY_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. Failures are logged and dropped.
    pub fn append(&self, event: &Event) {
        if let Err(e) = self.try_append(event) {
            tracing::warn!(
                trace_id = %event.id,
                path = %self.path.display(),
                error = %e,
                "Failed to append event to history log"
            );
        }
    }

    fn try_append(&self, event: &Event) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)
    }
}
