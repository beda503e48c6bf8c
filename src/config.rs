//! Configuration parsing and validation for vibehub.
//!
//! Configuration comes from an optional TOML file layered over environment
//! variables. Values written in the file win; anything the file leaves out is
//! taken from the conventional environment variable, then from the built-in
//! default.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::router::Provider;

/// File name of the event log inside the data directory.
pub const HISTORY_FILE: &str = "history.jsonl";

const DEFAULT_PORT: u16 = 3030;
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Root configuration structure.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3030")
    pub listen: String,
    /// Upper bound on establishing an upstream connection
    pub connect_timeout_secs: u64,
}

fn default_listen() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Where the event log lives.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Full path of the JSONL event log.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}

fn default_data_dir(home: Option<String>) -> PathBuf {
    let home = home.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join("brain").join("hub").join("logs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(None),
        }
    }
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level applied when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()` so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was picked up from the provider's conventional env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Settings for a single upstream provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key; required for every provider except `local`
    pub api_key: Option<ApiKey>,
    /// Chat completions endpoint. For Gemini this is the models prefix the
    /// model name and `:generateContent` are appended to.
    pub url: String,
    /// API version pin (only sent to Anthropic)
    pub api_version: Option<String>,
}

impl ProviderConfig {
    /// Built-in settings for a provider, without any key.
    pub fn defaults_for(provider: Provider) -> Self {
        Self {
            api_key: None,
            url: default_url(provider).to_string(),
            api_version: match provider {
                Provider::Anthropic => Some(DEFAULT_ANTHROPIC_VERSION.to_string()),
                _ => None,
            },
        }
    }
}

/// Per-provider settings, one slot per [`Provider`] variant.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub perplexity: ProviderConfig,
    pub gemini: ProviderConfig,
    pub local: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Perplexity => &self.perplexity,
            Provider::Gemini => &self.gemini,
            Provider::Local => &self.local,
        }
    }

    pub fn get_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Perplexity => &mut self.perplexity,
            Provider::Gemini => &mut self.gemini,
            Provider::Local => &mut self.local,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::defaults_for(Provider::OpenAi),
            anthropic: ProviderConfig::defaults_for(Provider::Anthropic),
            perplexity: ProviderConfig::defaults_for(Provider::Perplexity),
            gemini: ProviderConfig::defaults_for(Provider::Gemini),
            local: ProviderConfig::defaults_for(Provider::Local),
        }
    }
}

/// Built-in upstream endpoint for a provider.
pub fn default_url(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
        Provider::Anthropic => "https://api.anthropic.com/v1/chat/completions",
        Provider::Perplexity => "https://api.perplexity.ai/chat/completions",
        Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models/",
        Provider::Local => "http://localhost:11434/v1/chat/completions",
    }
}

/// Conventional env vars holding a provider's API key, in lookup order.
pub fn key_env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAi => &["OPENAI_API_KEY"],
        Provider::Anthropic => &["ANTHROPIC_API_KEY"],
        Provider::Perplexity => &["PERPLEXITY_API_KEY"],
        Provider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        Provider::Local => &["LOCAL_API_KEY"],
    }
}

/// Env var overriding a provider's endpoint URL.
pub fn url_env_var(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "OPENAI_API_BASE",
        Provider::Anthropic => "ANTHROPIC_API_BASE",
        Provider::Perplexity => "PERPLEXITY_API_BASE",
        Provider::Gemini => "GEMINI_API_BASE",
        Provider::Local => "LOCAL_API_BASE",
    }
}

/// Human-readable description of the env vars that can supply a key.
pub fn key_env_description(provider: Provider) -> String {
    key_env_vars(provider).join("/")
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServerConfig {
    listen: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStorageConfig {
    data_dir: Option<PathBuf>,
}

/// Raw provider section. api_key may contain `${VAR}` references not yet expanded.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProviderConfig {
    api_key: Option<String>,
    url: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProvidersConfig {
    openai: Option<RawProviderConfig>,
    anthropic: Option<RawProviderConfig>,
    perplexity: Option<RawProviderConfig>,
    gemini: Option<RawProviderConfig>,
    local: Option<RawProviderConfig>,
}

impl RawProvidersConfig {
    fn take(&mut self, provider: Provider) -> RawProviderConfig {
        let slot = match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Perplexity => &mut self.perplexity,
            Provider::Gemini => &mut self.gemini,
            Provider::Local => &mut self.local,
        };
        slot.take().unwrap_or_default()
    }
}

/// Raw configuration deserialized directly from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    storage: RawStorageConfig,
    #[serde(default)]
    providers: RawProvidersConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${PREFIX}-${SUFFIX}`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(
    input: &str,
    provider_name: &str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            provider: provider_name.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                provider: provider_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            provider: provider_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in provider '{}')",
                var_name, provider_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Look up the first non-empty conventional key variable for a provider.
fn convention_key_lookup<F>(provider: Provider, lookup: &F) -> Option<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    key_env_vars(provider).iter().find_map(|var| {
        lookup(var)
            .filter(|v| !v.is_empty())
            .map(|value| (var.to_string(), value))
    })
}

impl Config {
    /// Convert raw (deserialized) config to the final config.
    ///
    /// For each provider:
    /// - If `api_key` contains `${VAR}`: expand from environment, source = `EnvExpanded`
    /// - If `api_key` is a literal string: wrap directly, source = `Literal`
    /// - If `api_key` is absent: try the conventional env vars,
    ///   source = `Convention(var_name)` or `KeySource::None`
    pub fn from_raw_with<F>(
        mut raw: RawConfig,
        lookup: F,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen = match raw.server.listen {
            Some(listen) => listen,
            None => match lookup("HUB_PORT") {
                Some(port) => {
                    let port: u16 = port.trim().parse().map_err(|_| {
                        ConfigError::Validation(format!("HUB_PORT is not a valid port: {}", port))
                    })?;
                    format!("127.0.0.1:{}", port)
                }
                None => default_listen(),
            },
        };

        let server = ServerConfig {
            listen,
            connect_timeout_secs: raw
                .server
                .connect_timeout_secs
                .unwrap_or_else(default_connect_timeout),
        };

        let data_dir = raw
            .storage
            .data_dir
            .or_else(|| lookup("HUB_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| default_data_dir(lookup("HOME")));

        let mut providers = ProvidersConfig::default();
        let mut key_sources = Vec::with_capacity(Provider::ALL.len());

        for provider in Provider::ALL {
            let rp = raw.providers.take(provider);
            let name = provider.as_str();

            let (api_key, source) = match rp.api_key {
                Some(ref raw_key) if raw_key.contains("${") => {
                    let expanded = expand_env_vars_with(raw_key, name, &lookup)?;
                    (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
                }
                Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
                None => match convention_key_lookup(provider, &lookup) {
                    Some((var_name, value)) => {
                        (Some(ApiKey::from(value)), KeySource::Convention(var_name))
                    }
                    None => (None, KeySource::None),
                },
            };

            key_sources.push((provider, source));

            let slot = providers.get_mut(provider);
            slot.api_key = api_key;
            if let Some(url) = rp.url.or_else(|| lookup(url_env_var(provider))) {
                slot.url = url;
            }
            if rp.api_version.is_some() {
                slot.api_version = rp.api_version;
            } else if provider == Provider::Anthropic {
                if let Some(version) = lookup("ANTHROPIC_VERSION") {
                    slot.api_version = Some(version);
                }
            }
        }

        let config = Config {
            server,
            storage: StorageConfig { data_dir },
            providers,
            logging: raw.logging,
        };

        Ok((config, key_sources))
    }

    /// Parse configuration from a TOML string with a custom env lookup.
    pub fn parse_str_with<F>(
        content: &str,
        lookup: F,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw_with(raw, lookup)?;
        config.validate()?;
        Ok((config, key_sources))
    }

    /// Build configuration from the process environment alone.
    pub fn from_env() -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        let (config, key_sources) =
            Self::from_raw_with(RawConfig::default(), |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// This is the env-var-aware entry point. It:
    /// 1. Reads the file
    /// 2. Parses as `RawConfig` (api_key as plain String)
    /// 3. Expands `${VAR}` references and fills gaps from the environment
    /// 4. Validates the resulting config
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str_with(&content, |name| std::env::var(name).ok())
    }

    /// Load from `path` when given, otherwise from `default_path` if it exists,
    /// otherwise from the environment only.
    pub fn load(
        path: Option<&Path>,
        default_path: &Path,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        match path {
            Some(path) => Self::from_file_with_env(path),
            None if default_path.exists() => Self::from_file_with_env(default_path),
            None => Self::from_env(),
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.is_empty() {
            return Err(ConfigError::Validation("Listen address is empty".to_string()));
        }

        for provider in Provider::ALL {
            let url = &self.providers.get(provider).url;
            if reqwest::Url::parse(url).is_err() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has invalid URL '{}'",
                    provider, url
                )));
            }
        }

        Ok(())
    }
}
