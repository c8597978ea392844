//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{ "error": text }` JSON body with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_types::ErrorEnvelope;
use thiserror::Error;
use tracing::{error, warn};

use crate::upstream::UpstreamError;

/// All errors that can occur in the relay request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A classified failure of the upstream Ollama call.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upstream answered successfully but with an unusable body.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Upstream(UpstreamError::ConfigMissing) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Upstream(UpstreamError::Http { status, .. }) => *status,
            ServerError::Upstream(UpstreamError::ConnectionRefused { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            ServerError::Upstream(e) => {
                match e {
                    UpstreamError::ConfigMissing => {
                        error!(error = %e, "relay called without upstream configuration")
                    }
                    UpstreamError::Http { .. } => warn!(%status, error = %e, "upstream returned an error"),
                    UpstreamError::ConnectionRefused { source, .. }
                    | UpstreamError::Timeout { source, .. } => {
                        warn!(error = %e, cause = %source, "upstream unreachable")
                    }
                }
                e.to_string()
            }
            ServerError::BadRequest(m) => m.clone(),
            ServerError::BadGateway(m) => {
                warn!(message = %m, "unusable upstream response");
                m.clone()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };
        (
            status,
            Json(ErrorEnvelope {
                error: client_message,
            }),
        )
            .into_response()
    }
}
