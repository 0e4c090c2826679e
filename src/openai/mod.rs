//! OpenAI API clients for vision analysis and image generation.
//!
//! Providers are expressed as traits ([`VisionProvider`], [`ImageProvider`])
//! so dispatchers can be exercised against fakes; the concrete
//! implementations speak HTTP through an [`HttpTransport`].

pub mod error;
pub mod http;
pub mod images;
pub mod vision;

pub use error::{ProviderError, ServiceErrorKind};
pub use http::{FilePart, HttpTransport, MultipartBody, ReqwestTransport, DEFAULT_TIMEOUT};
pub use images::{
    EditRequest, GenerateRequest, ImageDatum, ImageProvider, ImagesResponse, OpenAiImages,
    UploadImage, VariationRequest,
};
pub use vision::{
    OpenAiVision, VisionImage, VisionProvider, VisionRequest, VisionResponse, DEFAULT_MAX_TOKENS,
    DEFAULT_VISION_MODEL,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Optional environment override for the API base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
