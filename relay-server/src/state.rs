//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::upstream::OllamaUpstream;

/// State shared across all HTTP handlers.
///
/// Holds no per-request data: every relay call is independent.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Pooled HTTP client bound to the configured Ollama server.
    pub upstream: OllamaUpstream,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let upstream = OllamaUpstream::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
        })
    }
}
