//! HTTP client for the upstream Ollama server.
//!
//! Every network call goes through [`OllamaUpstream`], which classifies
//! failures exactly once, at the `send()` boundary, into the closed
//! [`UpstreamError`] set. Handlers never inspect `reqwest` errors directly.

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use relay_types::ChatMessage;

use crate::config::Config;

const TAGS_PATH: &str = "/api/tags";
const CHAT_PATH: &str = "/api/chat";

/// Why an upstream call did not produce a usable response.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No upstream base URL is configured; no I/O was attempted.
    #[error("Ollama URL is not configured; set OLLAMA_URL")]
    ConfigMissing,

    /// The upstream answered with a non-success status.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// The upstream could not be reached at all.
    #[error("cannot connect to Ollama at {url}; is it running?")]
    ConnectionRefused {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream did not answer in time.
    #[error("timed out waiting for Ollama at {url}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Body forwarded to `POST /api/chat`.
///
/// `stream` is not taken from the caller: the relay always asks for a
/// streamed response.
#[derive(Debug, Serialize)]
pub struct ChatForward<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<&'a Value>,
}

/// Thin wrapper around a shared [`reqwest::Client`] bound to one upstream.
#[derive(Debug, Clone)]
pub struct OllamaUpstream {
    http: Client,
    base_url: Option<String>,
}

impl OllamaUpstream {
    /// Build the upstream client from server configuration.
    ///
    /// Only the connect phase is bounded: a chat stream may legitimately
    /// stay open for as long as the model keeps generating.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("relay-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.upstream_base().map(str::to_owned),
        })
    }

    /// `GET /api/tags`. Returns the response only when its status is a success.
    pub async fn tags(&self) -> Result<Response, UpstreamError> {
        let url = self.endpoint(TAGS_PATH)?;
        debug!(%url, "forwarding model listing");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        ensure_success(resp).await
    }

    /// `POST /api/chat`. The body is only read by the caller, so the
    /// returned response can be streamed onward chunk by chunk.
    pub async fn chat(&self, body: &ChatForward<'_>) -> Result<Response, UpstreamError> {
        let url = self.endpoint(CHAT_PATH)?;
        debug!(%url, model = body.model, messages = body.messages.len(), "forwarding chat");
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;
        ensure_success(resp).await
    }

    fn endpoint(&self, path: &str) -> Result<String, UpstreamError> {
        self.base_url
            .as_deref()
            .map(|base| format!("{base}{path}"))
            .ok_or(UpstreamError::ConfigMissing)
    }
}

/// Map a transport failure from `send()` onto the closed error set.
fn classify(err: reqwest::Error, url: &str) -> UpstreamError {
    let url = url.to_owned();
    if err.is_timeout() {
        UpstreamError::Timeout { url, source: err }
    } else {
        UpstreamError::ConnectionRefused { url, source: err }
    }
}

/// Pass successful responses through untouched; drain and classify the rest.
async fn ensure_success(resp: Response) -> Result<Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = match resp.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, %status, "failed to read upstream error body");
            String::new()
        }
    };
    Err(UpstreamError::Http {
        status,
        message: error_message(status, &body),
    })
}

/// Human-readable text for an upstream error body.
///
/// Ollama reports failures as `{"error": "..."}`; that inner string is
/// surfaced as-is instead of being nested inside another envelope.
fn error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(Value::String(inner)) = map.get("error") {
            return inner.clone();
        }
    }
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("upstream request failed")
            .to_owned()
    } else {
        trimmed.to_owned()
    }
}
