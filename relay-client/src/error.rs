use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`crate::RelayClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay could not be reached, or the connection broke mid-response.
    #[error("request to relay failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay answered with a non-success status and an error envelope.
    #[error("{message}")]
    Relay { status: StatusCode, message: String },

    /// The relay answered successfully but the body was not understood.
    #[error("unreadable response from relay: {0}")]
    Decode(String),
}
