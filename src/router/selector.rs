//! Provider selection logic.

use serde::{Deserialize, Serialize};

/// Upstream provider a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Anthropic,
    Perplexity,
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    /// All providers, in selection priority order.
    pub const ALL: [Provider; 5] = [
        Provider::Local,
        Provider::Anthropic,
        Provider::Perplexity,
        Provider::Gemini,
        Provider::OpenAi,
    ];

    /// Lowercase name used in logs, config sections and the event log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Anthropic => "anthropic",
            Provider::Perplexity => "perplexity",
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }

    /// Whether the upstream body can be relayed to the caller as a stream.
    ///
    /// Gemini responses are always normalized, so they are never relayed.
    pub fn supports_relay(&self) -> bool {
        !matches!(self, Provider::Gemini)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the provider for a model identifier.
///
/// Case-insensitive prefix/substring matching, first match wins:
/// local/ollama, claude/anthropic, sonar/pplx/perplexity, gemini/google.
/// Anything else (including the empty string) goes to OpenAI.
pub fn select_provider(model: &str) -> Provider {
    let m = model.to_lowercase();

    if m.starts_with("local-") || m.starts_with("ollama-") || m.contains("ollama") {
        Provider::Local
    } else if m.starts_with("claude-") || m.contains("anthropic") {
        Provider::Anthropic
    } else if m.starts_with("sonar") || m.starts_with("pplx") || m.contains("perplexity") {
        Provider::Perplexity
    } else if m.starts_with("gemini-") || m.contains("google") {
        Provider::Gemini
    } else {
        Provider::OpenAi
    }
}
