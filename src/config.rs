//! Configuration parsing and validation for chatrelay.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "./chatrelay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API (e.g., "https://api.moonshot.cn/v1")
    pub base_url: String,
    /// API key; may reference environment variables as `${VAR}`
    pub api_key: ApiKey,
    /// Model name sent on every completion request
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Seconds without a chunk from the provider before the stream is
    /// aborted. Idle-based: a long but actively-emitting stream is never
    /// cut off.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Seconds allowed for establishing the upstream connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_model() -> String {
    "moonshot-v1-8k".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The inner `SecretString` ensures the key value is:
/// - Zeroized in memory when dropped
/// - Never exposed via Debug or Display
/// - Only accessible via `.expose_secret()` (grep-auditable)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
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

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
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

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// in the API key from the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;

        let raw_key = config.upstream.api_key.expose_secret().to_string();
        if raw_key.contains("${") {
            let expanded = expand_env_vars(&raw_key)?;
            config.upstream.api_key = ApiKey::from(expanded);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.base_url must not be empty".to_string(),
            ));
        }
        if self.upstream.api_key.expose_secret().is_empty() {
            return Err(ConfigError::Validation(
                "upstream.api_key must not be empty".to_string(),
            ));
        }
        if self.upstream.idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
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

    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// The closure-based design makes this testable without touching global env
/// state. Supports multiple `${VAR}` in one string. Fails on the first
/// missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
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

        let end = after.find('}').ok_or_else(|| {
            ConfigError::EnvVar(format!("Unclosed '${{' in config value: {}", input))
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar(
                "Empty variable name in '${}' reference".to_string(),
            ));
        }

        let value = lookup(var_name).ok_or_else(|| {
            ConfigError::EnvVar(format!("Environment variable '{}' is not set", var_name))
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Expand all `${VAR}` references in a string using real environment variables.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [upstream]
        base_url = "https://api.example.com/v1"
        api_key = "sk-test"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::parse_str(MINIMAL).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.database.path, "./chatrelay.db");
        assert_eq!(config.upstream.model, "moonshot-v1-8k");
        assert_eq!(config.upstream.temperature, 0.7);
        assert_eq!(config.upstream.idle_timeout_secs, 30);
        assert_eq!(config.upstream.connect_timeout_secs, 10);
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let config = Config::parse_str(MINIMAL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn empty_base_url_rejected() {
        let toml = r#"
            [upstream]
            base_url = ""
            api_key = "sk-test"
        "#;
        assert!(matches!(
            Config::parse_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let toml = r#"
            [upstream]
            base_url = "https://api.example.com/v1"
            api_key = "sk-test"
            idle_timeout_secs = 0
        "#;
        assert!(matches!(
            Config::parse_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn expand_single_var() {
        let result = expand_env_vars_with("${API_KEY}", |name| {
            (name == "API_KEY").then(|| "sk-secret".to_string())
        })
        .unwrap();
        assert_eq!(result, "sk-secret");
    }

    #[test]
    fn expand_multiple_vars_with_literal_parts() {
        let result = expand_env_vars_with("${SCHEME}://${HOST}/v1", |name| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("api.example.com".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(result, "https://api.example.com/v1");
    }

    #[test]
    fn expand_missing_var_fails() {
        let result = expand_env_vars_with("${MISSING}", |_| None);
        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
    }

    #[test]
    fn expand_unclosed_brace_fails() {
        let result = expand_env_vars_with("${OOPS", |_| Some("x".to_string()));
        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
    }

    #[test]
    fn expand_empty_name_fails() {
        let result = expand_env_vars_with("${}", |_| Some("x".to_string()));
        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
    }

    #[test]
    fn no_references_passes_through() {
        let result = expand_env_vars_with("sk-literal", |_| None).unwrap();
        assert_eq!(result, "sk-literal");
    }
}
