//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for relay-server.
///
/// Every field except the upstream URL has a default so the server starts
/// without any environment variables set. A missing upstream URL is only
/// reported when a relay route is actually called.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Ollama server, e.g. `"http://127.0.0.1:11434"`.
    pub ollama_url: Option<String>,

    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Upper bound on establishing a TCP connection to the upstream.
    pub connect_timeout: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            ollama_url: std::env::var("OLLAMA_URL").ok(),
            bind_address: env_or("RELAY_BIND", "0.0.0.0:3000"),
            log_level: env_or("RELAY_LOG", "info"),
            log_json: parse_flag("RELAY_LOG_JSON", false),
            cors_allowed_origins: std::env::var("RELAY_CORS_ORIGINS").ok(),
            enable_swagger: parse_flag("RELAY_ENABLE_SWAGGER", true),
            connect_timeout: Duration::from_secs(parse_env("RELAY_CONNECT_TIMEOUT_SECS", 10)),
        }
    }

    /// The configured upstream base URL without trailing slashes, or `None`
    /// when it is unset or blank.
    pub fn upstream_base(&self) -> Option<&str> {
        self.ollama_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: None,
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: true,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
