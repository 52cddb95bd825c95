//! Configuration management for the gateway
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional: a missing file or section falls back to
//! defaults that match the original deployment (port 3000, 30 requests per
//! 60 second window, Groq's OpenAI-compatible endpoint). Two values overlay
//! from the environment at startup: the listening port (`PORT`) and the
//! provider API key (named by `upstream.api_key_env`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of pre-built client assets, served with an index.html
    /// fallback for single-page-app routing.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            assets_dir: default_assets_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_assets_dir() -> String {
    "public".to_string()
}

/// Completion provider configuration
///
/// The provider speaks the OpenAI-compatible chat-completions protocol.
/// The API key itself never lives in this struct (or the config file); only
/// the name of the environment variable holding it does, so a Debug or
/// Serialize of the config cannot leak the secret.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Admission gate configuration
///
/// Fields are private to enforce invariants: both the window length and the
/// request cap must be nonzero. Construction goes through the validated
/// `new()`, and deserialization routes through it as well, so an invalid
/// instance cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitConfig {
    window_seconds: u64,
    max_requests: u32,
}

impl RateLimitConfig {
    /// Create a validated RateLimitConfig
    ///
    /// # Errors
    ///
    /// Returns an error if either value is zero.
    pub fn new(window_seconds: u64, max_requests: u32) -> crate::error::AppResult<Self> {
        if window_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "rate_limit.window_seconds must be greater than 0".to_string(),
            ));
        }
        if max_requests == 0 {
            return Err(crate::error::AppError::Config(
                "rate_limit.max_requests must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            window_seconds,
            max_requests,
        })
    }

    /// Length of the fixed admission window in seconds
    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Maximum admitted requests per identity per window
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_window_seconds() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    30
}

/// Custom Deserialize implementation for RateLimitConfig
///
/// Enforces validation at deserialization time by calling the validated
/// `new()` constructor, eliminating the gap where an invalid instance could
/// exist between parsing and validation.
impl<'de> Deserialize<'de> for RateLimitConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};
        use std::fmt;

        #[derive(Deserialize)]
        #[serde(field_identifier, rename_all = "snake_case")]
        enum Field {
            WindowSeconds,
            MaxRequests,
        }

        struct RateLimitConfigVisitor;

        impl<'de> Visitor<'de> for RateLimitConfigVisitor {
            type Value = RateLimitConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str("a struct with optional fields window_seconds and max_requests")
            }

            fn visit_map<V>(self, mut map: V) -> Result<RateLimitConfig, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut window_seconds = None;
                let mut max_requests = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::WindowSeconds => {
                            if window_seconds.is_some() {
                                return Err(de::Error::duplicate_field("window_seconds"));
                            }
                            window_seconds = Some(map.next_value()?);
                        }
                        Field::MaxRequests => {
                            if max_requests.is_some() {
                                return Err(de::Error::duplicate_field("max_requests"));
                            }
                            max_requests = Some(map.next_value()?);
                        }
                    }
                }

                RateLimitConfig::new(
                    window_seconds.unwrap_or_else(default_window_seconds),
                    max_requests.unwrap_or_else(default_max_requests),
                )
                .map_err(|e| de::Error::custom(format!("Invalid rate limit configuration: {}", e)))
            }
        }

        deserializer.deserialize_struct(
            "RateLimitConfig",
            &["window_seconds", "max_requests"],
            RateLimitConfigVisitor,
        )
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration, tolerating a missing file
    ///
    /// The original deployment ran on environment variables alone, so a
    /// missing config file means "all defaults", not an error. A file that
    /// exists but fails to read, parse, or validate is still an error.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config.validate().map_err(|e| {
            crate::error::AppError::Config(format!(
                "Invalid config file '{}': {}",
                path_display, e
            ))
        })?;

        Ok(config)
    }

    /// Overlay the listening port from the environment
    ///
    /// `port` is the raw value of the `PORT` environment variable; `None`
    /// leaves the configured port untouched. Kept as an argument rather than
    /// read here so tests never have to mutate process environment.
    pub fn apply_port_override(&mut self, port: Option<String>) -> crate::error::AppResult<()> {
        if let Some(raw) = port {
            let parsed: u16 = raw.parse().map_err(|_| {
                crate::error::AppError::Config(format!(
                    "PORT must be a number between 1 and 65535, got '{}'",
                    raw
                ))
            })?;
            if parsed == 0 {
                return Err(crate::error::AppError::Config(
                    "PORT must be greater than 0".to_string(),
                ));
            }
            self.server.port = parsed;
        }
        Ok(())
    }

    /// Upstream request timeout as a Duration
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream.request_timeout_seconds)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> crate::error::AppResult<()> {
        if self.server.port == 0 {
            return Err(crate::error::AppError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if self.server.assets_dir.is_empty() {
            return Err(crate::error::AppError::Config(
                "server.assets_dir must not be empty".to_string(),
            ));
        }

        // Validate base_url: must start with http:// or https://
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(crate::error::AppError::Config(format!(
                "upstream.base_url '{}' is invalid. \
                base_url must start with 'http://' or 'https://'.",
                self.upstream.base_url
            )));
        }

        if self.upstream.model.is_empty() {
            return Err(crate::error::AppError::Config(
                "upstream.model must not be empty".to_string(),
            ));
        }

        if self.upstream.api_key_env.is_empty() {
            return Err(crate::error::AppError::Config(
                "upstream.api_key_env must not be empty".to_string(),
            ));
        }

        // Validate request timeout: same bounds the base timeout scheme used
        if self.upstream.request_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "upstream.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.upstream.request_timeout_seconds > 300 {
            return Err(crate::error::AppError::Config(format!(
                "upstream.request_timeout_seconds cannot exceed 300 seconds (5 minutes), got {}",
                self.upstream.request_timeout_seconds
            )));
        }

        // Rate limit invariants are enforced by RateLimitConfig's custom
        // Deserialize, which calls the validated constructor at parse time.

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        // Validate config before returning
        config.validate()?;
        Ok(config)
    }
}

/// Resolve the provider API key from the environment
///
/// `value` is the raw lookup result for the variable named by
/// `upstream.api_key_env`; passing it in keeps this testable without
/// mutating process environment. Every chat request needs the key, so its
/// absence is a startup error, not a request-time one.
pub fn resolve_api_key(var_name: &str, value: Option<String>) -> crate::error::AppResult<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(crate::error::AppError::Config(format!(
            "Provider API key not found: set the {} environment variable",
            var_name
        ))),
    }
}
