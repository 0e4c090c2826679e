//! Analysis tools: describe, analyze, compare, metadata and cache management.

use schemars::JsonSchema;
use serde::Deserialize;

use super::group_thousands;
use crate::analysis::{AnalysisDispatcher, AnalysisOutcome, AnalysisType};
use crate::cache::CacheStats;
use crate::error::ImageToolError;
use crate::inspect::ImageMetadata;

const FROM_CACHE_NOTE: &str = "\n\n[Result retrieved from cache]";

/// Input parameters for the describe_image tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DescribeImageInput {
    #[schemars(description = "Path to the image file (absolute, or relative to the server's working directory)")]
    pub image_path: String,

    #[schemars(description = "Custom instruction for the description (default: describe the image in detail)")]
    pub prompt: Option<String>,
}

/// Input parameters for the analyze_image_content tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeImageContentInput {
    #[schemars(description = "Path to the image file")]
    pub image_path: String,

    #[schemars(
        description = "Type of analysis: general, objects, text, colors, composition, emotions (default: general)"
    )]
    pub analysis_type: Option<String>,
}

/// Input parameters for the compare_images tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompareImagesInput {
    #[schemars(description = "Path to the first image")]
    pub image1_path: String,

    #[schemars(description = "Path to the second image")]
    pub image2_path: String,

    #[schemars(description = "What to focus on (default: similarities and differences)")]
    pub comparison_focus: Option<String>,
}

/// Input parameters for the get_image_metadata tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImageMetadataInput {
    #[schemars(description = "Path to the image file")]
    pub image_path: String,
}

pub async fn run_describe(
    dispatcher: &AnalysisDispatcher,
    input: DescribeImageInput,
) -> Result<String, ImageToolError> {
    let outcome = dispatcher.describe(&input.image_path, input.prompt.as_deref()).await?;
    Ok(format_single(&outcome, "Description"))
}

pub async fn run_analyze(
    dispatcher: &AnalysisDispatcher,
    input: AnalyzeImageContentInput,
) -> Result<String, ImageToolError> {
    let analysis_type = match input.analysis_type.as_deref() {
        Some(raw) => raw.parse::<AnalysisType>()?,
        None => AnalysisType::default(),
    };
    let outcome = dispatcher.analyze(&input.image_path, analysis_type).await?;
    let heading = format!("{} Analysis", capitalize(analysis_type.as_str()));
    Ok(format_single(&outcome, &heading))
}

pub async fn run_compare(
    dispatcher: &AnalysisDispatcher,
    input: CompareImagesInput,
) -> Result<String, ImageToolError> {
    let outcome = dispatcher
        .compare(&input.image1_path, &input.image2_path, input.comparison_focus.as_deref())
        .await?;
    let focus = input
        .comparison_focus
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(crate::analysis::DEFAULT_COMPARISON_FOCUS);

    let mut text = format!("Image Comparison - Focus: {}\n\n", focus);
    for (label, image) in ["First Image", "Second Image"].iter().zip(&outcome.payload.images) {
        text.push_str(&format!(
            "{}: '{}' ({}x{} pixels, {} format)\n",
            label, image.file_name, image.width, image.height, image.format
        ));
    }
    text.push_str(&format!("\nComparison:\n{}", outcome.payload.text));
    if outcome.from_cache() {
        text.push_str(FROM_CACHE_NOTE);
    }
    Ok(text)
}

pub fn run_metadata(
    dispatcher: &AnalysisDispatcher,
    input: ImageMetadataInput,
) -> Result<String, ImageToolError> {
    let metadata = dispatcher.metadata(&input.image_path)?;
    Ok(format_metadata(&input.image_path, &metadata))
}

pub fn run_cache_info(dispatcher: &AnalysisDispatcher) -> Result<String, ImageToolError> {
    Ok(match dispatcher.cache_stats() {
        Some(stats) => format_cache_info(&stats),
        None => "Image analysis cache is disabled. Every analysis call goes to the API.".to_string(),
    })
}

pub fn run_clear_cache(dispatcher: &AnalysisDispatcher) -> Result<String, ImageToolError> {
    if dispatcher.cache().is_none() {
        return Ok("Image analysis cache is disabled. Nothing to clear.".to_string());
    }
    let removed = dispatcher.clear_cache();
    Ok(format!("Successfully cleared image analysis cache. Removed {} cached files.", removed))
}

fn format_single(outcome: &AnalysisOutcome, heading: &str) -> String {
    let payload = &outcome.payload;
    let mut text = match payload.images.first() {
        Some(image) => format!(
            "Image Analysis for '{}':\n\nImage Info: {}x{} pixels, {} format\n\n{}:\n{}",
            image.file_name, image.width, image.height, image.format, heading, payload.text
        ),
        None => format!("{}:\n{}", heading, payload.text),
    };
    if outcome.from_cache() {
        text.push_str(FROM_CACHE_NOTE);
    }
    text
}

pub fn format_metadata(requested: &str, meta: &ImageMetadata) -> String {
    format!(
        "Image Metadata for '{}':\n\n\
         File Information:\n\
         - File size: {} bytes ({:.2} MB)\n\
         - Format: {}\n\
         - Dimensions: {} x {} pixels\n\
         - Color mode: {}\n\
         - Aspect ratio: {:.2}\n\
         - Total pixels: {}\n\n\
         Path Information:\n\
         - Absolute path: {}\n\
         - File extension: {}\n\
         - Parent directory: {}\n",
        requested,
        group_thousands(meta.file_size),
        meta.file_size as f64 / (1024.0 * 1024.0),
        meta.format,
        meta.width,
        meta.height,
        meta.color_mode,
        meta.aspect_ratio(),
        group_thousands(meta.total_pixels()),
        meta.path.display(),
        meta.extension,
        meta.parent.display(),
    )
}

pub fn format_cache_info(stats: &CacheStats) -> String {
    format!(
        "Image Analysis Cache Information:\n\n\
         Cache Directory: {}\n\
         Number of cached files: {}\n\
         Total cache size: {:.2} MB ({} bytes)\n\n\
         Cache Features:\n\
         - Automatic file change detection using SHA-256 content fingerprints\n\
         - 30-day cache expiration\n\
         - Keys derived from file content and request parameters\n\
         - Cache failures never affect analysis results\n",
        stats.location.display(),
        stats.entry_count,
        stats.total_megabytes(),
        group_thousands(stats.total_bytes),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisPayload, AnalyzedImage, CacheStatus};
    use std::path::PathBuf;

    fn outcome(status: CacheStatus) -> AnalysisOutcome {
        AnalysisOutcome {
            payload: AnalysisPayload {
                text: "A red square.".into(),
                model: "gpt-4o".into(),
                images: vec![AnalyzedImage {
                    file_name: "red.png".into(),
                    width: 4,
                    height: 4,
                    format: "PNG".into(),
                }],
            },
            cache_status: status,
        }
    }

    #[test]
    fn test_format_single_fresh() {
        let text = format_single(&outcome(CacheStatus::Miss), "Description");
        assert_eq!(
            text,
            "Image Analysis for 'red.png':\n\nImage Info: 4x4 pixels, PNG format\n\nDescription:\nA red square."
        );
    }

    #[test]
    fn test_format_single_from_cache() {
        let text = format_single(&outcome(CacheStatus::Hit), "Description");
        assert!(text.ends_with("[Result retrieved from cache]"));
    }

    #[test]
    fn test_format_cache_info() {
        let stats =
            CacheStats { entry_count: 3, total_bytes: 2048, location: PathBuf::from("/tmp/c") };
        let text = format_cache_info(&stats);
        assert!(text.contains("Cache Directory: /tmp/c"));
        assert!(text.contains("Number of cached files: 3"));
        assert!(text.contains("(2,048 bytes)"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("colors"), "Colors");
        assert_eq!(capitalize(""), "");
    }
}
