//! Outbound calls to upstream providers.
//!
//! One handler per [`Provider`] variant. OpenAI, Anthropic, Perplexity and
//! the local server already speak the caller's format, so their handlers
//! forward the request body unchanged and hand back the raw response.
//! Gemini is translated both ways and always comes back fully materialized.

use axum::http::{header, StatusCode};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;

use super::gemini::{self, DEFAULT_GEMINI_MODEL};
use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::{key_env_description, ApiKey, ProviderConfig, ProvidersConfig};
use crate::error::{Error, Result};
use crate::router::Provider;

/// What an upstream handler produced.
#[derive(Debug)]
pub enum UpstreamReply {
    /// Upstream response with its body not yet read.
    Raw(reqwest::Response),
    /// Completion already normalized into the OpenAI shape.
    Normalized {
        status: StatusCode,
        body: ChatCompletionResponse,
    },
}

/// Send `request` to `provider`.
///
/// A missing API key fails with [`Error::MissingApiKey`] before any network
/// I/O happens.
pub async fn dispatch(
    client: &Client,
    providers: &ProvidersConfig,
    provider: Provider,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let config = providers.get(provider);
    match provider {
        Provider::OpenAi => call_openai(client, config, request).await,
        Provider::Anthropic => call_anthropic(client, config, request).await,
        Provider::Perplexity => call_perplexity(client, config, request).await,
        Provider::Local => call_local(client, config, request).await,
        Provider::Gemini => call_gemini(client, config, request).await,
    }
}

/// Return the provider's key or the configuration error naming its env var.
fn require_key(provider: Provider, config: &ProviderConfig) -> Result<&ApiKey> {
    config.api_key.as_ref().ok_or_else(|| Error::MissingApiKey {
        provider,
        var: key_env_description(provider),
    })
}

/// POST the caller's body exactly as it was received.
fn json_post(client: &Client, url: &str, request: &ChatCompletionRequest) -> RequestBuilder {
    client
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(request.raw().clone())
}

async fn send(provider: Provider, builder: RequestBuilder) -> Result<UpstreamReply> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(error = %e, provider = %provider, "Failed to reach provider");
        Error::Upstream(e)
    })?;

    tracing::debug!(provider = %provider, status = %response.status(), "Provider responded");
    Ok(UpstreamReply::Raw(response))
}

async fn call_openai(
    client: &Client,
    config: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let key = require_key(Provider::OpenAi, config)?;
    let builder = json_post(client, &config.url, request).bearer_auth(key.expose_secret());
    send(Provider::OpenAi, builder).await
}

async fn call_anthropic(
    client: &Client,
    config: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let key = require_key(Provider::Anthropic, config)?;
    let mut builder = json_post(client, &config.url, request)
        .bearer_auth(key.expose_secret())
        .header("x-api-key", key.expose_secret());
    if let Some(version) = &config.api_version {
        builder = builder.header("anthropic-version", version);
    }
    send(Provider::Anthropic, builder).await
}

async fn call_perplexity(
    client: &Client,
    config: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let key = require_key(Provider::Perplexity, config)?;
    let builder = json_post(client, &config.url, request).bearer_auth(key.expose_secret());
    send(Provider::Perplexity, builder).await
}

/// The local server is the one provider that works without a key.
async fn call_local(
    client: &Client,
    config: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let mut builder = json_post(client, &config.url, request);
    if let Some(key) = &config.api_key {
        builder = builder.bearer_auth(key.expose_secret());
    }
    send(Provider::Local, builder).await
}

/// Build `<prefix><model>:generateContent?key=<key>`.
pub fn gemini_url(prefix: &str, model: &str, key: &str) -> Result<Url> {
    let mut url = Url::parse(prefix)
        .map_err(|e| Error::Internal(format!("Invalid Gemini URL '{}': {}", prefix, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Internal(format!("Gemini URL '{}' cannot take a path", prefix)))?
        .pop_if_empty()
        .push(&format!("{}:generateContent", model));
    url.query_pairs_mut().append_pair("key", key);

    Ok(url)
}

async fn call_gemini(
    client: &Client,
    config: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamReply> {
    let key = require_key(Provider::Gemini, config)?;
    let model = match request.model() {
        "" => DEFAULT_GEMINI_MODEL,
        model => model,
    };
    let url = gemini_url(&config.url, model, key.expose_secret())?;

    tracing::debug!(
        provider = %Provider::Gemini,
        model = %model,
        path = %url.path(),
        "Sending generateContent request"
    );

    let payload = gemini::to_gemini_request(request);
    let response = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, provider = %Provider::Gemini, "Failed to reach provider");
            Error::Upstream(e)
        })?;

    let status = response.status();
    let bytes = response.bytes().await?;
    let parsed: Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!(error = %e, status = %status, "Failed to parse Gemini response");
        Error::InvalidUpstreamBody(format!("Gemini response is not valid JSON: {}", e))
    })?;

    let created = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    Ok(UpstreamReply::Normalized {
        status,
        body: gemini::normalize_response(&parsed, model, created),
    })
}
