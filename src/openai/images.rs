//! Image generation, edit and variation endpoints.
//!
//! Request shapes differ per model, so each builder only sends the fields
//! the target model accepts.

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::{FilePart, HttpTransport, MultipartBody};
use super::DEFAULT_OPENAI_BASE_URL;
use crate::generation::ImageModel;

/// An image file to upload (edit source, mask, or variation source).
#[derive(Debug, Clone)]
pub struct UploadImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: ImageModel,
    pub prompt: String,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub n: u8,
}

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub model: ImageModel,
    pub prompt: String,
    pub image: UploadImage,
    pub mask: Option<UploadImage>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub n: u8,
}

#[derive(Debug, Clone)]
pub struct VariationRequest {
    pub image: UploadImage,
    pub size: String,
    pub n: u8,
}

/// One returned image: inline base64 or a short-lived URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDatum {
    pub b64_json: Option<String>,
    pub url: Option<String>,
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesUsage {
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
    pub usage: Option<ImagesUsage>,
}

/// A text-to-image model API.
#[async_trait]
pub trait ImageProvider: Send + Sync + std::fmt::Debug {
    async fn generate(&self, request: GenerateRequest) -> Result<ImagesResponse, ProviderError>;

    async fn edit(&self, request: EditRequest) -> Result<ImagesResponse, ProviderError>;

    async fn create_variation(
        &self,
        request: VariationRequest,
    ) -> Result<ImagesResponse, ProviderError>;

    /// Fetch an image returned by URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// OpenAI images API provider.
#[derive(Debug)]
pub struct OpenAiImages<C: HttpTransport> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpTransport> OpenAiImages<C> {
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
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v1/images/{}", self.base_url, endpoint)
    }

    fn build_generate(&self, request: &GenerateRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model.as_str(),
            "prompt": request.prompt,
            "n": request.n,
        });

        if let Some(ref size) = request.size {
            body["size"] = serde_json::json!(size);
        }
        if let Some(ref quality) = request.quality {
            body["quality"] = serde_json::json!(quality);
        }
        if let (Some(style), ImageModel::DallE3) = (&request.style, request.model) {
            body["style"] = serde_json::json!(style);
        }
        // gpt-image-1 always answers with base64 and rejects response_format
        if request.model != ImageModel::GptImage1 {
            body["response_format"] = serde_json::json!("b64_json");
        }

        body
    }

    fn build_edit(&self, request: EditRequest) -> MultipartBody {
        let mut body = MultipartBody::new()
            .text("model", request.model.as_str())
            .text("prompt", request.prompt)
            .text("n", request.n.to_string())
            .file(upload_part("image", request.image));

        if let Some(mask) = request.mask {
            body = body.file(upload_part("mask", mask));
        }
        if let Some(size) = request.size {
            body = body.text("size", size);
        }
        if let (Some(quality), ImageModel::GptImage1) = (request.quality, request.model) {
            body = body.text("quality", quality);
        }
        if request.model != ImageModel::GptImage1 {
            body = body.text("response_format", "b64_json");
        }

        body
    }

    fn build_variation(&self, request: VariationRequest) -> MultipartBody {
        MultipartBody::new()
            .text("model", ImageModel::DallE2.as_str())
            .text("n", request.n.to_string())
            .text("size", request.size)
            .text("response_format", "b64_json")
            .file(upload_part("image", request.image))
    }

    fn headers(&self) -> [(&str, &str); 1] {
        [("Authorization", self.auth_header.as_str())]
    }

    fn parse_response(json: serde_json::Value) -> Result<ImagesResponse, ProviderError> {
        serde_json::from_value(json)
            .map_err(|e| ProviderError::bad_response(format!("Failed to parse response: {}", e)))
    }
}

fn upload_part(field: &str, image: UploadImage) -> FilePart {
    FilePart { field: field.to_string(), file_name: image.file_name, mime: image.mime, bytes: image.bytes }
}

#[async_trait]
impl<C: HttpTransport> ImageProvider for OpenAiImages<C> {
    async fn generate(&self, request: GenerateRequest) -> Result<ImagesResponse, ProviderError> {
        let body = self.build_generate(&request);
        tracing::debug!(model = %request.model, n = request.n, "image generation request");
        let json = self.client.post_json(&self.url("generations"), &self.headers(), &body).await?;
        Self::parse_response(json)
    }

    async fn edit(&self, request: EditRequest) -> Result<ImagesResponse, ProviderError> {
        tracing::debug!(model = %request.model, n = request.n, "image edit request");
        let body = self.build_edit(request);
        let json = self.client.post_multipart(&self.url("edits"), &self.headers(), body).await?;
        Self::parse_response(json)
    }

    async fn create_variation(
        &self,
        request: VariationRequest,
    ) -> Result<ImagesResponse, ProviderError> {
        tracing::debug!(n = request.n, size = %request.size, "image variation request");
        let body = self.build_variation(request);
        let json =
            self.client.post_multipart(&self.url("variations"), &self.headers(), body).await?;
        Self::parse_response(json)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.client.get_bytes(url).await
    }
}
