//! Validation and persistence around the image generation API.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::models::{
    ImageModel, ImageRequestParams, SourceRule, DEFAULT_VARIATIONS, DEFAULT_VARIATION_SIZE,
    MAX_VARIATIONS, VARIATION_SOURCE,
};
use super::output::{
    self, GeneratedImageRecord, DEFAULT_EDITED_DIR, DEFAULT_GENERATED_DIR, DEFAULT_VARIATIONS_DIR,
};
use crate::error::ImageToolError;
use crate::inspect::{self, ImageInfo};
use crate::openai::{
    EditRequest, GenerateRequest, ImageProvider, ImagesResponse, ServiceErrorKind, UploadImage,
    VariationRequest,
};
use crate::paths::{resolve_path, validate_image_path};

/// Arguments of `generate_image`.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub prompt: String,
    pub model: ImageModel,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub n: Option<u32>,
    pub output_dir: Option<String>,
    pub filename_prefix: Option<String>,
}

/// Arguments of `edit_image`.
#[derive(Debug, Clone)]
pub struct EditParams {
    pub image_path: String,
    pub prompt: String,
    pub mask_path: Option<String>,
    pub model: ImageModel,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub n: Option<u32>,
    pub output_dir: Option<String>,
    pub filename_prefix: Option<String>,
}

/// Arguments of `create_image_variations`.
#[derive(Debug, Clone, Default)]
pub struct VariationParams {
    pub image_path: String,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub output_dir: Option<String>,
    pub filename_prefix: Option<String>,
}

/// Result for one requested image.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Saved { index: usize, path: PathBuf, revised_prompt: Option<String> },
    Failed { index: usize, reason: String },
}

impl ItemOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Saved { index, .. } | Self::Failed { index, .. } => *index,
        }
    }
}

/// Per-item results of a generation, edit or variation call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub model: ImageModel,
    pub requested: usize,
    pub output_dir: PathBuf,
    pub items: Vec<ItemOutcome>,
    pub total_tokens: Option<u64>,
}

impl GenerationOutcome {
    pub fn saved_paths(&self) -> Vec<&Path> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ItemOutcome::Saved { path, .. } => Some(path.as_path()),
                ItemOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(usize, &str)> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ItemOutcome::Failed { index, reason } => Some((*index, reason.as_str())),
                ItemOutcome::Saved { .. } => None,
            })
            .collect()
    }

    /// `PartialFailure` when some, but not all, items were saved.
    pub fn partial_failure(&self) -> Option<ImageToolError> {
        let succeeded = self.saved_paths().len();
        (succeeded > 0 && succeeded < self.items.len())
            .then_some(ImageToolError::PartialFailure { succeeded, requested: self.items.len() })
    }
}

/// Where and under which names results are written.
struct OutputTarget {
    dir: PathBuf,
    prefix: String,
    timestamp: i64,
}

impl OutputTarget {
    fn prepare(
        dir: Option<&str>,
        default_dir: &str,
        prefix: Option<&str>,
        default_prefix: &str,
    ) -> Result<Self, ImageToolError> {
        Ok(Self {
            dir: output::prepare_output_dir(dir, default_dir)?,
            prefix: output::sanitize_prefix(prefix, default_prefix),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }
}

#[derive(Debug)]
pub struct GenerationDispatcher {
    images: Arc<dyn ImageProvider>,
}

impl GenerationDispatcher {
    pub fn new(images: Arc<dyn ImageProvider>) -> Self {
        Self { images }
    }

    pub async fn generate(&self, params: GenerateParams) -> Result<GenerationOutcome, ImageToolError> {
        let n = params.n.unwrap_or(1);
        params.model.spec().validate(&ImageRequestParams {
            prompt: &params.prompt,
            size: params.size.as_deref(),
            quality: params.quality.as_deref(),
            style: params.style.as_deref(),
            n,
        })?;
        let target = OutputTarget::prepare(
            params.output_dir.as_deref(),
            DEFAULT_GENERATED_DIR,
            params.filename_prefix.as_deref(),
            "generated",
        )?;

        let request = GenerateRequest {
            model: params.model,
            prompt: params.prompt,
            size: params.size,
            quality: params.quality,
            style: params.style,
            n: to_count(n)?,
        };
        let response = self.images.generate(request).await?;
        self.persist(params.model, response, n as usize, target).await
    }

    pub async fn edit(&self, params: EditParams) -> Result<GenerationOutcome, ImageToolError> {
        let model = params.model;
        let rule = model.edit_rule().ok_or_else(|| {
            ImageToolError::invalid_input(format!(
                "Model {} does not support image edits. Use gpt-image-1 or dall-e-2",
                model
            ))
        })?;
        let n = params.n.unwrap_or(1);
        model.spec().validate(&ImageRequestParams {
            prompt: &params.prompt,
            size: params.size.as_deref(),
            quality: params.quality.as_deref(),
            style: None,
            n,
        })?;

        let (image_path, image_info) = load_source(&params.image_path, "Image", rule)?;
        let mask = match params.mask_path.as_deref() {
            Some(raw) => Some(load_mask(raw, model, &image_info)?),
            None => None,
        };
        let target = OutputTarget::prepare(
            params.output_dir.as_deref(),
            DEFAULT_EDITED_DIR,
            params.filename_prefix.as_deref(),
            "edited",
        )?;

        let request = EditRequest {
            model,
            prompt: params.prompt,
            image: upload(&image_path, &image_info)?,
            mask,
            size: params.size,
            quality: params.quality,
            n: to_count(n)?,
        };
        let response = self.images.edit(request).await?;
        self.persist(model, response, n as usize, target).await
    }

    pub async fn create_variations(
        &self,
        params: VariationParams,
    ) -> Result<GenerationOutcome, ImageToolError> {
        let n = params.n.unwrap_or(DEFAULT_VARIATIONS);
        if !(1..=MAX_VARIATIONS).contains(&n) {
            return Err(ImageToolError::invalid_input(format!(
                "n must be between 1 and {} for variations, got n={}",
                MAX_VARIATIONS, n
            )));
        }
        let size = params.size.unwrap_or_else(|| DEFAULT_VARIATION_SIZE.to_string());
        let dalle2 = ImageModel::DallE2.spec();
        if !dalle2.sizes.contains(&size.as_str()) {
            return Err(ImageToolError::invalid_input(format!(
                "Invalid size '{}' for variations. Valid sizes: {}",
                size,
                dalle2.sizes.join(", ")
            )));
        }

        let (image_path, image_info) = load_source(&params.image_path, "Image", &VARIATION_SOURCE)?;
        let target = OutputTarget::prepare(
            params.output_dir.as_deref(),
            DEFAULT_VARIATIONS_DIR,
            params.filename_prefix.as_deref(),
            "variation",
        )?;

        let request =
            VariationRequest { image: upload(&image_path, &image_info)?, size, n: to_count(n)? };
        let response = self.images.create_variation(request).await?;
        self.persist(ImageModel::DallE2, response, n as usize, target).await
    }

    /// Scan an output directory (default `generated_images`).
    pub fn list_generated(
        &self,
        directory: Option<&str>,
    ) -> Result<Vec<GeneratedImageRecord>, ImageToolError> {
        let raw = directory.map(str::trim).filter(|d| !d.is_empty()).unwrap_or(DEFAULT_GENERATED_DIR);
        output::list_images(&resolve_path(raw))
    }

    /// Decode and save every returned item independently.
    async fn persist(
        &self,
        model: ImageModel,
        response: ImagesResponse,
        requested: usize,
        target: OutputTarget,
    ) -> Result<GenerationOutcome, ImageToolError> {
        let total_tokens = response.usage.and_then(|u| u.total_tokens);
        let mut items = Vec::with_capacity(requested.max(response.data.len()));

        for (i, datum) in response.data.into_iter().enumerate() {
            let index = i + 1;
            let bytes = match (datum.b64_json, datum.url) {
                (Some(b64), _) => output::decode_base64(&b64),
                (None, Some(url)) => self.images.download(&url).await.map_err(|e| e.to_string()),
                (None, None) => Err("response item carried no image data".to_string()),
            };
            let stem = output::file_stem(&target.prefix, target.timestamp, index);
            let item = match bytes.and_then(|b| output::save_image(&target.dir, &stem, &b)) {
                Ok(path) => {
                    tracing::info!(path = %path.display(), "saved image");
                    ItemOutcome::Saved { index, path, revised_prompt: datum.revised_prompt }
                }
                Err(reason) => {
                    tracing::warn!(index, %reason, "failed to save image");
                    ItemOutcome::Failed { index, reason }
                }
            };
            items.push(item);
        }
        for index in items.len() + 1..=requested {
            items.push(ItemOutcome::Failed { index, reason: "not returned by the API".to_string() });
        }

        let outcome = GenerationOutcome { model, requested, output_dir: target.dir, items, total_tokens };
        if outcome.saved_paths().is_empty() {
            let reasons: Vec<String> =
                outcome.failures().iter().map(|(i, r)| format!("#{}: {}", i, r)).collect();
            return Err(ImageToolError::external(
                ServiceErrorKind::BadResponse,
                format!("none of {} images could be saved: {}", outcome.items.len(), reasons.join("; ")),
            ));
        }
        Ok(outcome)
    }
}

fn to_count(n: u32) -> Result<u8, ImageToolError> {
    u8::try_from(n).map_err(|_| ImageToolError::invalid_input(format!("n={} is out of range", n)))
}

fn file_size(path: &Path) -> Result<u64, ImageToolError> {
    fs::metadata(path).map(|m| m.len()).map_err(|e| {
        ImageToolError::invalid_input(format!("Cannot stat '{}': {}", path.display(), e))
    })
}

fn load_source(
    raw: &str,
    label: &str,
    rule: &SourceRule,
) -> Result<(PathBuf, ImageInfo), ImageToolError> {
    let path = validate_image_path(raw, &label.to_lowercase())?;
    let info = inspect::probe(&path)?;
    rule.check(label, &info, file_size(&path)?)?;
    Ok((path, info))
}

fn load_mask(raw: &str, model: ImageModel, source: &ImageInfo) -> Result<UploadImage, ImageToolError> {
    let path = validate_image_path(raw, "mask")?;
    let info = inspect::probe(&path)?;
    if info.format != image::ImageFormat::Png {
        return Err(ImageToolError::invalid_input("Mask must be a PNG image"));
    }
    if model == ImageModel::DallE2 && (info.width, info.height) != (source.width, source.height) {
        return Err(ImageToolError::invalid_input(format!(
            "Mask dimensions {}x{} must match image dimensions {}x{}",
            info.width, info.height, source.width, source.height
        )));
    }
    upload(&path, &info)
}

fn upload(path: &Path, info: &ImageInfo) -> Result<UploadImage, ImageToolError> {
    let bytes = fs::read(path).map_err(|e| {
        ImageToolError::invalid_input(format!("Failed to read '{}': {}", path.display(), e))
    })?;
    Ok(UploadImage {
        file_name: inspect::file_name_of(path),
        mime: inspect::mime_type(info.format).to_string(),
        bytes,
    })
}
