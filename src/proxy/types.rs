//! OpenAI-compatible request and response types.
//!
//! The request is kept exactly as the caller sent it. Pass-through providers
//! get the original bytes; the gateway only reads a few fields out of the
//! parsed JSON, and reads them leniently so an odd value never rejects a call.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat completion request (OpenAI-compatible), as received.
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    raw: Bytes,
    body: Value,
}

impl ChatCompletionRequest {
    /// Parse a request body. Only malformed JSON is an error; a blank body
    /// counts as `{}`.
    pub fn from_slice(raw: Bytes) -> serde_json::Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let body = serde_json::from_slice(&raw)?;
        Ok(Self { raw, body })
    }

    pub fn from_value(body: Value) -> Self {
        Self {
            raw: Bytes::from(body.to_string()),
            body,
        }
    }

    /// The bytes forwarded to pass-through providers.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The requested model, or the empty string when absent or not a string.
    pub fn model(&self) -> &str {
        self.body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Messages as sent. Anything other than an array reads as empty.
    pub fn messages(&self) -> &[Value] {
        self.body
            .get("messages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `messages` for the request event: the value as sent, `[]` when unset.
    pub fn logged_messages(&self) -> Value {
        self.body
            .get("messages")
            .filter(|m| is_truthy(m))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()))
    }

    /// Whether the caller asked for streaming (`stream` is truthy).
    pub fn wants_stream(&self) -> bool {
        self.body.get("stream").is_some_and(is_truthy)
    }

    /// Generation parameters recorded alongside a request event, verbatim.
    pub fn meta(&self) -> GenerationMeta {
        let field = |name: &str| self.body.get(name).cloned();
        GenerationMeta {
            temperature: field("temperature"),
            top_p: field("top_p"),
            max_tokens: field("max_tokens"),
        }
    }
}

impl Default for ChatCompletionRequest {
    fn default() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }
}

/// JavaScript-style truthiness, which is how callers of this API treat flags.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Free-form generation parameters, kept as the caller sent them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GenerationMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Value>,
}

/// Chat completion response (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    /// Provider usage block, passed through as-is; null when absent
    pub usage: Option<Value>,
}

/// A completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// Message carried by a completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}
