//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for parley-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set (an API key is still needed to
/// reach the hosted completion API).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://parley.db"`).
    /// Use `"sqlite::memory:"` for a throwaway store.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Base URL of the OpenAI-compatible completion API.
    pub completion_url: String,

    /// Bearer token sent to the completion API. Empty means no header.
    pub api_key: String,

    /// Model identifier used when a request does not name one.
    pub model: String,

    /// Connect timeout for the upstream HTTP client.
    pub connect_timeout: Duration,

    /// Capacity of the per-request relay channel.
    pub stream_buffer: usize,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("PARLEY_BIND", "0.0.0.0:3000"),
            database_url: env_or("PARLEY_DATABASE_URL", "sqlite://parley.db"),
            log_level: env_or("PARLEY_LOG", "info"),
            log_json: env_flag("PARLEY_LOG_JSON", false),
            completion_url: env_or("PARLEY_COMPLETION_URL", "https://openrouter.ai/api/v1"),
            api_key: env_or("OPENROUTER_API_KEY", ""),
            model: env_or("PARLEY_MODEL", "anthropic/claude-3.7-sonnet"),
            connect_timeout: Duration::from_secs(parse_env("PARLEY_CONNECT_TIMEOUT_SECS", 30)),
            stream_buffer: parse_env("PARLEY_STREAM_BUFFER", 32usize).max(1),
            cors_allowed_origins: std::env::var("PARLEY_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_docs: env_flag("PARLEY_ENABLE_DOCS", true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".into(),
            database_url: "sqlite::memory:".into(),
            log_level: "info".into(),
            log_json: false,
            completion_url: "https://openrouter.ai/api/v1".into(),
            api_key: String::new(),
            model: "anthropic/claude-3.7-sonnet".into(),
            connect_timeout: Duration::from_secs(30),
            stream_buffer: 32,
            cors_allowed_origins: None,
            enable_docs: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
