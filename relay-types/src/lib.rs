//! Wire types shared by the relay server and its clients.
//!
//! The shapes mirror the subset of the Ollama HTTP API that the relay
//! touches: `/api/tags` for model listings and `/api/chat` for streamed
//! chat completions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Media type of a newline-delimited JSON body.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// ── Conversation ─────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

// ── Model listing ────────────────────────────────────────────────────────────

/// One entry of the upstream model listing.
///
/// Only `name` is relied upon; the remaining metadata is carried along when
/// present so that callers can display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ModelDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            modified_at: None,
            size: None,
            digest: None,
            details: None,
        }
    }
}

/// Body of `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

// ── Streaming ────────────────────────────────────────────────────────────────

/// The nested message object of a streamed chat line.
///
/// `role` is kept as free text so that a role this crate does not model
/// never causes a content-bearing line to be rejected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FragmentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One NDJSON line of a streamed `/api/chat` response.
///
/// ```text
/// {"model":"llama3.2","message":{"role":"assistant","content":"Hel"},"done":false}
/// {"model":"llama3.2","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<FragmentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
}

impl StreamFragment {
    /// Incremental assistant text carried by this line, if any.
    pub fn content(&self) -> Option<&str> {
        self.message.as_ref()?.content.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Uniform JSON error body returned by every failing relay call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_is_lowercase_on_the_wire() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::from_str("system").unwrap(), Role::System);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn tags_response_tolerates_extra_metadata() {
        let body = r#"{"models":[{"name":"llama3.2:latest","model":"llama3.2:latest",
            "modified_at":"2024-10-01T12:00:00Z","size":2019393189,
            "digest":"a80c4f17","details":{"family":"llama"},"expires_at":"never"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3.2:latest");
        assert_eq!(tags.models[0].details.as_ref().unwrap()["family"], "llama");
    }

    #[test]
    fn tags_response_without_models_is_empty() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }

    #[test]
    fn fragment_content_is_optional() {
        let with: StreamFragment =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
                .unwrap();
        assert_eq!(with.content(), Some("Hel"));
        assert!(!with.is_done());

        let without: StreamFragment =
            serde_json::from_str(r#"{"done":true,"done_reason":"stop","eval_count":10}"#).unwrap();
        assert_eq!(without.content(), None);
        assert!(without.is_done());
    }
}
