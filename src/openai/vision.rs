//! Vision analysis through the chat completions endpoint.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::HttpTransport;
use super::DEFAULT_OPENAI_BASE_URL;

pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// An image attached to a vision request.
#[derive(Debug, Clone)]
pub struct VisionImage {
    /// MIME type, e.g. `image/png`.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl VisionImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub images: Vec<VisionImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionResponse {
    pub text: String,
    pub model: String,
    pub total_tokens: Option<u64>,
}

/// A vision-capable language model.
#[async_trait]
pub trait VisionProvider: Send + Sync + std::fmt::Debug {
    async fn analyze(&self, request: VisionRequest) -> Result<VisionResponse, ProviderError>;

    /// Model identifier; part of every analysis cache key.
    fn model(&self) -> &str;
}

/// Chat-completions vision provider.
#[derive(Debug)]
pub struct OpenAiVision<C: HttpTransport> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl<C: HttpTransport> OpenAiVision<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &VisionRequest) -> serde_json::Value {
        let mut content = vec![serde_json::json!({"type": "text", "text": request.prompt})];
        for image in &request.images {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {"url": image.data_url()}
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": content}],
            "max_tokens": self.max_tokens,
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<VisionResponse, ProviderError> {
        let response: ChatResponse = serde_json::from_value(json)
            .map_err(|e| ProviderError::bad_response(format!("Failed to parse response: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::bad_response("No choices in response"))?;

        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::bad_response("Empty message content in response"))?;

        Ok(VisionResponse {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            total_tokens: response.usage.map(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl<C: HttpTransport> VisionProvider for OpenAiVision<C> {
    async fn analyze(&self, request: VisionRequest) -> Result<VisionResponse, ProviderError> {
        let url = self.chat_completions_url();
        let body = self.build_request(&request);
        let headers =
            [("Authorization", self.auth_header.as_str()), ("Content-Type", "application/json")];

        tracing::debug!(model = %self.model, images = request.images.len(), "vision request");
        let response = self.client.post_json(&url, &headers, &body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}
