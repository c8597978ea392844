//! HTTP client for `relay-server`.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use relay_types::{ErrorEnvelope, ModelDescriptor, TagsResponse};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;
use crate::session::ChatRequest;

const TAGS_PATH: &str = "/api/ollama/tags";
const CHAT_PATH: &str = "/api/ollama/chat";

/// Raw body of a successful chat call, chunk by chunk, exactly as received.
pub type ChatByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [relay_types::ChatMessage],
}

impl RelayClient {
    /// Client for the relay at `base_url`, e.g. `"http://127.0.0.1:3000"`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("relay-chat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/ollama/tags`, reduced to the model descriptors.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ClientError> {
        let resp = self
            .http
            .get(format!("{}{TAGS_PATH}", self.base_url))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        debug!(count = tags.models.len(), "models listed");
        Ok(tags.models)
    }

    /// `POST /api/ollama/chat`.
    ///
    /// Resolves once the relay has answered with a success status; the
    /// reply itself is then read from the returned stream.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatByteStream, ClientError> {
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
        };
        let resp = self
            .http
            .post(format!("{}{CHAT_PATH}", self.base_url))
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        debug!(model = %request.model, "chat stream opened");
        Ok(resp.bytes_stream().map_err(ClientError::from).boxed())
    }
}

/// Turn a non-success relay response into [`ClientError::Relay`].
async fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => envelope.error,
        Err(_) if !text.trim().is_empty() => text.trim().to_owned(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("relay request failed")
            .to_owned(),
    };
    Err(ClientError::Relay { status, message })
}

#[cfg(test)]
mod test {
    use super::*;
    use relay_types::ChatMessage;
    use reqwest::StatusCode;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_models_reads_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "llama3.2" }, { "name": "qwen2.5", "size": 42 }]
            })))
            .mount(&server)
            .await;

        let client = RelayClient::new(format!("{}/", server.uri())).unwrap();
        let models = client.list_models().await.unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["llama3.2", "qwen2.5"]);
        assert_eq!(models[1].size, Some(42));
    }

    #[tokio::test]
    async fn relay_error_envelope_becomes_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "error": "cannot connect to Ollama" })),
            )
            .mount(&server)
            .await;

        let client = RelayClient::new(server.uri()).unwrap();
        match client.list_models().await.unwrap_err() {
            ClientError::Relay { status, message } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(message, "cannot connect to Ollama");
            }
            other => panic!("expected Relay, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_sends_model_and_history_and_yields_raw_bytes() {
        let server = MockServer::start().await;
        let body = "{\"message\":{\"content\":\"hi\"}}\n";
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_json(serde_json::json!({
                "model": "llama3.2",
                "messages": [{ "role": "user", "content": "hello" }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = RelayClient::new(server.uri()).unwrap();
        let request = ChatRequest {
            model: "llama3.2".into(),
            messages: vec![ChatMessage::user("hello")],
        };
        let chunks: Vec<Bytes> = client
            .chat(&request)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), body.as_bytes());
    }
}
