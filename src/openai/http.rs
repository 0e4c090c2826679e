//! HTTP transport seam for the OpenAI providers.
//!
//! Providers talk to [`HttpTransport`], so tests can swap in a mock while
//! production uses [`ReqwestTransport`].

use std::time::Duration;

use async_trait::async_trait;

use super::error::ProviderError;

/// Default per-request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Transport-agnostic multipart body.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// HTTP operations the OpenAI providers need (for mocking).
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    async fn post_multipart(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: MultipartBody,
    ) -> Result<serde_json::Value, ProviderError>;

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Real transport using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::bad_response(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(body).send().await?;
        Self::read_json(response).await
    }

    async fn post_multipart(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: MultipartBody,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in body.fields {
            form = form.text(name, value);
        }
        for file in body.files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime)?;
            form = form.part(file.field, part);
        }

        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.multipart(form).send().await?;
        Self::read_json(response).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    use crate::openai::error::ServiceErrorKind;

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        // Connections complete in the backlog but nothing ever replies
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        let transport = ReqwestTransport::new(Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let err = transport
            .post_json(&url, &[], &serde_json::json!({ "model": "gpt-4o" }))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ServiceErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(10));
        drop(listener);
    }
}
