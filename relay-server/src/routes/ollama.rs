//! Relay routes for the upstream Ollama server.
//!
//! Both handlers are stateless: one upstream call per request, nothing
//! retained afterwards. The chat route passes the upstream NDJSON body
//! through byte-for-byte without buffering or re-encoding it.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use relay_types::{ChatMessage, NDJSON_CONTENT_TYPE};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::{OpenApi, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::error::ServerError;
use crate::state::AppState;
use crate::upstream::ChatForward;

#[derive(OpenApi)]
#[openapi(paths(list_tags, chat), components(schemas(ChatRelayRequest)))]
pub struct OllamaApi;

/// Register the relay routes (nested under `/api/ollama`).
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/chat", post(chat))
}

/// Request body for `POST /api/ollama/chat`.
///
/// `model` and `messages` are optional at the type level so that their
/// absence is reported as a 400 envelope rather than an extractor rejection.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatRelayRequest {
    /// Name of the model to chat with, as listed by `/api/ollama/tags`.
    #[validate(
        required(message = "model is required"),
        length(min = 1, message = "model is required")
    )]
    pub model: Option<String>,
    /// Conversation history in chronological order.
    #[validate(required(message = "messages are required"))]
    #[schema(value_type = Option<Vec<Object>>)]
    pub messages: Option<Vec<ChatMessage>>,
    /// Ignored: the relay always streams.
    #[serde(default)]
    pub stream: Option<bool>,
    /// Model parameters forwarded to Ollama unchanged.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub options: Option<Value>,
    /// Output format constraint forwarded to Ollama unchanged.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub format: Option<Value>,
    /// Model keep-alive duration forwarded to Ollama unchanged.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub keep_alive: Option<Value>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// List locally available models (`GET /api/ollama/tags`).
///
/// The upstream JSON body is returned as received.
#[utoipa::path(
    get,
    path = "/api/ollama/tags",
    tag = "ollama",
    responses(
        (status = 200, description = "Upstream model listing", body = Value),
        (status = 500, description = "Upstream URL not configured"),
        (status = 502, description = "Upstream returned an unreadable listing"),
        (status = 503, description = "Upstream unreachable"),
    )
)]
pub async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let resp = state.upstream.tags().await?;
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let body = resp.bytes().await.map_err(|e| {
        ServerError::BadGateway(format!("failed to read the Ollama model listing: {e}"))
    })?;
    serde_json::from_slice::<IgnoredAny>(&body).map_err(|e| {
        ServerError::BadGateway(format!("Ollama returned an unreadable model listing: {e}"))
    })?;

    debug!(bytes = body.len(), "model listing relayed");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|e| ServerError::Internal(format!("failed to build listing response: {e}")))
}

/// Stream a chat completion (`POST /api/ollama/chat`).
///
/// On success the response is the upstream NDJSON stream, one JSON object
/// per line. Every failure detected before the stream starts is reported as
/// a single `{ "error": ... }` object.
#[utoipa::path(
    post,
    path = "/api/ollama/chat",
    tag = "ollama",
    request_body = ChatRelayRequest,
    responses(
        (status = 200, description = "Chunked NDJSON stream", body = String, content_type = "application/x-ndjson"),
        (status = 400, description = "Missing model or messages"),
        (status = 500, description = "Upstream URL not configured"),
        (status = 503, description = "Upstream unreachable"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRelayRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| ServerError::BadRequest(validation_message(&e)))?;

    let (Some(model), Some(messages)) = (req.model.as_deref(), req.messages.as_deref()) else {
        return Err(ServerError::BadRequest(
            "model and messages are required".into(),
        ));
    };

    if req.stream == Some(false) {
        debug!("caller asked for a non-streamed reply; streaming anyway");
    }

    let forward = ChatForward {
        model,
        messages,
        stream: true,
        options: req.options.as_ref(),
        format: req.format.as_ref(),
        keep_alive: req.keep_alive.as_ref(),
    };
    let upstream = state.upstream.chat(&forward).await?;

    info!(model, messages = messages.len(), "chat stream opened");

    let content_type = stream_content_type(upstream.headers());
    let body = Body::from_stream(
        upstream
            .bytes_stream()
            .inspect_err(|e| warn!(error = %e, "upstream chat stream interrupted")),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| ServerError::Internal(format!("failed to build stream response: {e}")))
}

/// Content type for the relayed stream: the upstream's own, else NDJSON.
fn stream_content_type(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(NDJSON_CONTENT_TYPE))
}

fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .collect();
    messages.sort();
    messages.dedup();
    messages.join("; ")
}

// ── Tests ──────────────────────────────────────────────────────────────────────
