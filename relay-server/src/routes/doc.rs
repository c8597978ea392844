use crate::routes::{health, ollama};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "relay-server",
    description = "Streaming chat relay for a local Ollama server",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(ollama::OllamaApi::openapi());
    root
}
