//! Core MCP server implementation.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};

use super::tools::analysis::{
    self, AnalyzeImageContentInput, CompareImagesInput, DescribeImageInput, ImageMetadataInput,
};
use super::tools::generation::{
    self, CreateImageVariationsInput, EditImageInput, GenerateImageInput, ListGeneratedImagesInput,
};
use super::tools::into_call_result;
use crate::analysis::AnalysisDispatcher;
use crate::cache::CacheStore;
use crate::config::ImagecraftConfig;
use crate::generation::GenerationDispatcher;
use crate::openai::{OpenAiImages, OpenAiVision, ProviderError, ReqwestTransport};

/// The imagecraft MCP server
///
/// Exposes cached image analysis and image generation as MCP tools.
#[derive(Debug, Clone)]
pub struct ImagecraftMcpServer {
    analysis: Arc<AnalysisDispatcher>,
    generation: Arc<GenerationDispatcher>,
    tool_router: ToolRouter<Self>,
}

impl ImagecraftMcpServer {
    /// Wire the OpenAI providers and the cache from configuration.
    pub fn from_config(config: &ImagecraftConfig, api_key: &str) -> Result<Self, ProviderError> {
        let transport = ReqwestTransport::new(config.openai.timeout())?;
        let vision = OpenAiVision::with_base_url(transport.clone(), api_key, &config.openai.base_url)
            .with_model(&config.openai.vision_model)
            .with_max_tokens(config.openai.max_tokens);
        let images = OpenAiImages::with_base_url(transport, api_key, &config.openai.base_url);

        let cache = if config.cache.enabled {
            let store = CacheStore::new(config.cache.resolved_dir(), config.cache.ttl());
            tracing::info!(dir = %store.root().display(), ttl_days = config.cache.ttl_days, "analysis cache enabled");
            Some(store)
        } else {
            tracing::info!("analysis cache disabled");
            None
        };

        Ok(Self::new(
            AnalysisDispatcher::new(Arc::new(vision), cache),
            GenerationDispatcher::new(Arc::new(images)),
        ))
    }
}

#[tool_router]
impl ImagecraftMcpServer {
    pub fn new(analysis: AnalysisDispatcher, generation: GenerationDispatcher) -> Self {
        Self {
            analysis: Arc::new(analysis),
            generation: Arc::new(generation),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Describe an image using a vision model. Results are cached by file content and prompt."
    )]
    async fn describe_image(
        &self,
        Parameters(input): Parameters<DescribeImageInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_describe(&self.analysis, input).await))
    }

    #[tool(
        description = "Analyze an image with a specific focus: general, objects, text, colors, composition or emotions."
    )]
    async fn analyze_image_content(
        &self,
        Parameters(input): Parameters<AnalyzeImageContentInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_analyze(&self.analysis, input).await))
    }

    #[tool(description = "Compare two images in a single vision call. Argument order matters.")]
    async fn compare_images(
        &self,
        Parameters(input): Parameters<CompareImagesInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_compare(&self.analysis, input).await))
    }

    #[tool(description = "Read technical metadata (format, dimensions, color mode, size) of an image.")]
    async fn get_image_metadata(
        &self,
        Parameters(input): Parameters<ImageMetadataInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_metadata(&self.analysis, input)))
    }

    #[tool(description = "Show the location, entry count and size of the image analysis cache.")]
    async fn get_cache_info(&self) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_cache_info(&self.analysis)))
    }

    #[tool(description = "Remove every cached image analysis result.")]
    async fn clear_image_cache(&self) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(analysis::run_clear_cache(&self.analysis)))
    }

    #[tool(
        description = "Generate images from a text prompt with dall-e-2, dall-e-3 or gpt-image-1 and save them to disk."
    )]
    async fn generate_image(
        &self,
        Parameters(input): Parameters<GenerateImageInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(generation::run_generate(&self.generation, input).await))
    }

    #[tool(description = "Edit or extend an existing image with gpt-image-1 or dall-e-2, optionally using a PNG mask.")]
    async fn edit_image(
        &self,
        Parameters(input): Parameters<EditImageInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(generation::run_edit(&self.generation, input).await))
    }

    #[tool(description = "Create variations of a square PNG image with dall-e-2.")]
    async fn create_image_variations(
        &self,
        Parameters(input): Parameters<CreateImageVariationsInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(generation::run_variations(&self.generation, input).await))
    }

    #[tool(description = "List images in an output directory, newest first, with size and dimensions.")]
    async fn list_generated_images(
        &self,
        Parameters(input): Parameters<ListGeneratedImagesInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(generation::run_list(&self.generation, input)))
    }
}

#[tool_handler]
impl ServerHandler for ImagecraftMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "imagecraft".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Image analysis and generation. Use describe_image, analyze_image_content and \
                 compare_images for cached vision analysis, get_image_metadata for local file \
                 details, and generate_image, edit_image and create_image_variations to create \
                 new images on disk."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server on stdin/stdout until the client disconnects.
pub async fn run_server(server: ImagecraftMcpServer) -> Result<(), Box<dyn std::error::Error>> {
    let service = server.serve(rmcp::transport::stdio()).await?;
    tracing::info!("MCP server ready on stdio");
    service.waiting().await?;
    Ok(())
}
