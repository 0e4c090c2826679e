//! Generation tools: generate, edit, variations and listing.

use schemars::JsonSchema;
use serde::Deserialize;

use super::group_thousands;
use crate::error::ImageToolError;
use crate::generation::{
    EditParams, GenerateParams, GeneratedImageRecord, GenerationDispatcher, GenerationOutcome,
    ImageModel, ItemOutcome, VariationParams, DEFAULT_GENERATED_DIR,
};

/// Input parameters for the generate_image tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageInput {
    #[schemars(description = "Text description of the image to generate")]
    pub prompt: String,

    #[schemars(description = "Model: dall-e-2, dall-e-3 or gpt-image-1 (default: dall-e-3)")]
    pub model: Option<String>,

    #[schemars(
        description = "Image size. dall-e-2: 256x256, 512x512, 1024x1024. dall-e-3: 1024x1024, 1792x1024, 1024x1792. gpt-image-1: 1024x1024, 1536x1024, 1024x1536, auto"
    )]
    pub size: Option<String>,

    #[schemars(
        description = "Quality. dall-e-2: standard. dall-e-3: standard, hd. gpt-image-1: low, medium, high, auto"
    )]
    pub quality: Option<String>,

    #[schemars(description = "Style (dall-e-3 only): vivid or natural")]
    pub style: Option<String>,

    #[schemars(description = "Number of images (dall-e-3: 1 only; others: 1-10; default: 1)")]
    pub n: Option<u32>,

    #[schemars(description = "Directory to save images in (default: generated_images)")]
    pub output_dir: Option<String>,

    #[schemars(description = "Filename prefix (default: generated)")]
    pub filename_prefix: Option<String>,
}

/// Input parameters for the edit_image tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditImageInput {
    #[schemars(
        description = "Path to the source image (dall-e-2: square PNG under 4MB; gpt-image-1: PNG, JPEG or WebP under 50MB)"
    )]
    pub image_path: String,

    #[schemars(description = "Description of the desired edit")]
    pub prompt: String,

    #[schemars(description = "Optional PNG mask; transparent areas mark where to edit")]
    pub mask_path: Option<String>,

    #[schemars(description = "Model: gpt-image-1 or dall-e-2 (default: gpt-image-1)")]
    pub model: Option<String>,

    #[schemars(description = "Output image size")]
    pub size: Option<String>,

    #[schemars(description = "Quality (gpt-image-1 only): low, medium, high, auto")]
    pub quality: Option<String>,

    #[schemars(description = "Number of edited images (1-10, default: 1)")]
    pub n: Option<u32>,

    #[schemars(description = "Directory to save images in (default: edited_images)")]
    pub output_dir: Option<String>,

    #[schemars(description = "Filename prefix (default: edited)")]
    pub filename_prefix: Option<String>,
}

/// Input parameters for the create_image_variations tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateImageVariationsInput {
    #[schemars(description = "Path to the source image (square PNG under 4MB)")]
    pub image_path: String,

    #[schemars(description = "Number of variations (1-10, default: 2)")]
    pub n: Option<u32>,

    #[schemars(description = "Size: 256x256, 512x512 or 1024x1024 (default: 1024x1024)")]
    pub size: Option<String>,

    #[schemars(description = "Directory to save images in (default: image_variations)")]
    pub output_dir: Option<String>,

    #[schemars(description = "Filename prefix (default: variation)")]
    pub filename_prefix: Option<String>,
}

/// Input parameters for the list_generated_images tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListGeneratedImagesInput {
    #[schemars(description = "Directory to scan (default: generated_images)")]
    pub directory: Option<String>,
}

fn parse_model(raw: Option<&str>, default: ImageModel) -> Result<ImageModel, ImageToolError> {
    raw.map(str::parse::<ImageModel>).transpose().map(|m| m.unwrap_or(default))
}

pub async fn run_generate(
    dispatcher: &GenerationDispatcher,
    input: GenerateImageInput,
) -> Result<String, ImageToolError> {
    let model = parse_model(input.model.as_deref(), ImageModel::DallE3)?;
    let summary = summarize(&[
        ("size", input.size.as_deref()),
        ("quality", input.quality.as_deref()),
        ("style", input.style.as_deref()),
    ]);
    let prompt = input.prompt.clone();
    let outcome = dispatcher
        .generate(GenerateParams {
            prompt: input.prompt,
            model,
            size: input.size,
            quality: input.quality,
            style: input.style,
            n: input.n,
            output_dir: input.output_dir,
            filename_prefix: input.filename_prefix,
        })
        .await?;

    let mut text = format!(
        "Successfully generated {} image(s) using {}\n\nPrompt: {}\nParameters: model={}{}, n={}\n\n",
        outcome.saved_paths().len(),
        model,
        prompt,
        model,
        summary,
        outcome.requested
    );
    text.push_str(&format_items(&outcome, "Generated files"));
    Ok(text)
}

pub async fn run_edit(
    dispatcher: &GenerationDispatcher,
    input: EditImageInput,
) -> Result<String, ImageToolError> {
    let model = parse_model(input.model.as_deref(), ImageModel::GptImage1)?;
    let source = input.image_path.clone();
    let prompt = input.prompt.clone();
    let outcome = dispatcher
        .edit(EditParams {
            image_path: input.image_path,
            prompt: input.prompt,
            mask_path: input.mask_path,
            model,
            size: input.size,
            quality: input.quality,
            n: input.n,
            output_dir: input.output_dir,
            filename_prefix: input.filename_prefix,
        })
        .await?;

    let mut text = format!(
        "Successfully edited image using {}\n\nSource: {}\nEdit prompt: {}\n\n",
        model, source, prompt
    );
    text.push_str(&format_items(&outcome, "Edited files"));
    Ok(text)
}

pub async fn run_variations(
    dispatcher: &GenerationDispatcher,
    input: CreateImageVariationsInput,
) -> Result<String, ImageToolError> {
    let source = input.image_path.clone();
    let outcome = dispatcher
        .create_variations(VariationParams {
            image_path: input.image_path,
            n: input.n,
            size: input.size,
            output_dir: input.output_dir,
            filename_prefix: input.filename_prefix,
        })
        .await?;

    let mut text = format!(
        "Successfully created {} variation(s) using {}\n\nSource: {}\n\n",
        outcome.saved_paths().len(),
        outcome.model,
        source
    );
    text.push_str(&format_items(&outcome, "Variation files"));
    Ok(text)
}

pub fn run_list(
    dispatcher: &GenerationDispatcher,
    input: ListGeneratedImagesInput,
) -> Result<String, ImageToolError> {
    let directory = input.directory.clone().unwrap_or_else(|| DEFAULT_GENERATED_DIR.to_string());
    let records = dispatcher.list_generated(input.directory.as_deref())?;
    Ok(format_listing(&directory, &records))
}

fn summarize(params: &[(&str, Option<&str>)]) -> String {
    params
        .iter()
        .filter_map(|(name, value)| value.map(|v| format!(", {}={}", name, v)))
        .collect()
}

fn format_items(outcome: &GenerationOutcome, heading: &str) -> String {
    let mut text = format!("{} (in {}):\n", heading, outcome.output_dir.display());
    for item in &outcome.items {
        match item {
            ItemOutcome::Saved { path, revised_prompt, .. } => {
                text.push_str(&format!("- {}\n", path.display()));
                if let Some(revised) = revised_prompt {
                    text.push_str(&format!("  Revised prompt: {}\n", revised));
                }
            }
            ItemOutcome::Failed { index, reason } => {
                text.push_str(&format!("- image {} FAILED: {}\n", index, reason));
            }
        }
    }
    if let Some(partial) = outcome.partial_failure() {
        text.push_str(&format!("\nWarning [{}]: {}\n", partial.kind(), partial));
    }
    if let Some(tokens) = outcome.total_tokens {
        text.push_str(&format!("\nToken usage: {} total tokens\n", tokens));
    }
    text
}

pub fn format_listing(directory: &str, records: &[GeneratedImageRecord]) -> String {
    if records.is_empty() {
        return format!("No image files found in '{}'", directory);
    }

    let mut text = format!(
        "Generated Images in '{}':\nFound {} image file(s)\n\n",
        directory,
        records.len()
    );
    for (i, record) in records.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, record.file_name));
        text.push_str(&format!("   Path: {}\n", record.path.display()));
        text.push_str(&format!(
            "   Size: {} bytes ({:.2} MB)\n",
            group_thousands(record.size_bytes),
            record.size_megabytes()
        ));
        text.push_str(&format!("   Modified: {}\n", record.modified.format("%Y-%m-%d %H:%M:%S UTC")));
        if let (Some(width), Some(height)) = (record.width, record.height) {
            text.push_str(&format!("   Dimensions: {}x{} pixels\n", width, height));
        }
        if let Some(ref format) = record.format {
            text.push_str(&format!("   Format: {}\n", format));
        }
        text.push('\n');
    }
    text
}
