//! Gemini `generateContent` translation.
//!
//! Gemini is the only provider that does not speak the OpenAI chat format.
//! Requests are mapped onto `contents`, and the reply is folded back into a
//! synthetic `chat.completion` object so callers never see the native shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{AssistantMessage, ChatCompletionRequest, ChatCompletionResponse, Choice};

/// Model used when the caller did not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Gemini GenerateContent request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    /// "user" or "model" (never "assistant")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
}

/// Map an OpenAI role onto a Gemini role.
///
/// Gemini has no system role here, so system turns are sent as user turns.
pub fn map_role(role: &str) -> &str {
    match role {
        "assistant" => "model",
        "system" => "user",
        other => other,
    }
}

/// Flatten message content to one string.
///
/// A string passes through; an array contributes each part's `text`, parts
/// without one (images, audio) contribute nothing; anything else is empty.
pub fn flatten_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

fn to_content(message: &Value) -> GeminiContent {
    GeminiContent {
        role: message
            .get("role")
            .and_then(Value::as_str)
            .map(|role| map_role(role).to_string()),
        parts: vec![GeminiPart {
            text: Some(flatten_content(message.get("content"))),
        }],
    }
}

/// Whole non-negative numbers only; `1000.0` counts.
fn token_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Build the outbound Gemini request, one content entry per message.
///
/// Numeric generation parameters become `generationConfig`; values of any
/// other type are left out.
pub fn to_gemini_request(request: &ChatCompletionRequest) -> GeminiRequest {
    let meta = request.meta();
    let config = GenerationConfig {
        temperature: meta.temperature.as_ref().and_then(Value::as_f64),
        top_p: meta.top_p.as_ref().and_then(Value::as_f64),
        max_output_tokens: meta.max_tokens.as_ref().and_then(token_count),
    };
    let has_params = config.temperature.is_some()
        || config.top_p.is_some()
        || config.max_output_tokens.is_some();

    GeminiRequest {
        contents: request.messages().iter().map(to_content).collect(),
        generation_config: has_params.then_some(config),
    }
}

/// Concatenate the text parts of the first candidate.
pub fn first_candidate_text(response: &Value) -> String {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Fold a Gemini reply into an OpenAI-shaped completion.
///
/// `created` is Unix seconds. The id falls back to a fresh `gemini-<uuid>`
/// when the upstream did not send a `responseId`.
pub fn normalize_response(response: &Value, model: &str, created: u64) -> ChatCompletionResponse {
    let id = response
        .get("responseId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("gemini-{}", uuid::Uuid::new_v4()));

    ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: first_candidate_text(response),
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: response
            .get("usageMetadata")
            .filter(|usage| !usage.is_null())
            .cloned(),
    }
}
