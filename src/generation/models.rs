//! Per-model constraints for image generation, edits and variations.

use std::fmt;
use std::str::FromStr;

use image::ImageFormat;

use crate::error::ImageToolError;
use crate::inspect::ImageInfo;

const MIB: u64 = 1024 * 1024;

/// Image models accepted by the generation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageModel {
    DallE2,
    DallE3,
    GptImage1,
}

impl ImageModel {
    pub const ALL: [ImageModel; 3] = [Self::DallE2, Self::DallE3, Self::GptImage1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DallE2 => "dall-e-2",
            Self::DallE3 => "dall-e-3",
            Self::GptImage1 => "gpt-image-1",
        }
    }

    pub fn spec(&self) -> &'static ModelSpec {
        match self {
            Self::DallE2 => &DALL_E_2,
            Self::DallE3 => &DALL_E_3,
            Self::GptImage1 => &GPT_IMAGE_1,
        }
    }

    /// Source image rule for edits, or `None` when the model cannot edit.
    pub fn edit_rule(&self) -> Option<&'static SourceRule> {
        match self {
            Self::DallE2 => Some(&DALL_E_2_SOURCE),
            Self::GptImage1 => Some(&GPT_IMAGE_1_EDIT_SOURCE),
            Self::DallE3 => None,
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageModel {
    type Err = ImageToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == wanted).ok_or_else(|| {
            ImageToolError::invalid_input(format!(
                "Invalid model '{}'. Choose from: dall-e-2, dall-e-3, gpt-image-1",
                s
            ))
        })
    }
}

/// Allowed parameter values for one model.
#[derive(Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub model: ImageModel,
    pub sizes: &'static [&'static str],
    pub qualities: &'static [&'static str],
    pub styles: &'static [&'static str],
    pub max_n: u32,
    pub max_prompt_chars: usize,
}

pub const DALL_E_2: ModelSpec = ModelSpec {
    model: ImageModel::DallE2,
    sizes: &["256x256", "512x512", "1024x1024"],
    qualities: &["standard"],
    styles: &[],
    max_n: 10,
    max_prompt_chars: 1000,
};

pub const DALL_E_3: ModelSpec = ModelSpec {
    model: ImageModel::DallE3,
    sizes: &["1024x1024", "1792x1024", "1024x1792"],
    qualities: &["standard", "hd"],
    styles: &["vivid", "natural"],
    max_n: 1,
    max_prompt_chars: 4000,
};

pub const GPT_IMAGE_1: ModelSpec = ModelSpec {
    model: ImageModel::GptImage1,
    sizes: &["1024x1024", "1536x1024", "1024x1536", "auto"],
    qualities: &["low", "medium", "high", "auto"],
    styles: &[],
    max_n: 10,
    max_prompt_chars: 32000,
};

/// The tunable parameters of a generation or edit request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRequestParams<'a> {
    pub prompt: &'a str,
    pub size: Option<&'a str>,
    pub quality: Option<&'a str>,
    pub style: Option<&'a str>,
    pub n: u32,
}

impl ModelSpec {
    /// Check every parameter against this model, reporting all violations at once.
    pub fn validate(&self, params: &ImageRequestParams<'_>) -> Result<(), ImageToolError> {
        let mut errors = Vec::new();
        let model = self.model;

        if params.prompt.trim().is_empty() {
            errors.push("Prompt must not be empty".to_string());
        }
        let prompt_chars = params.prompt.chars().count();
        if prompt_chars > self.max_prompt_chars {
            errors.push(format!(
                "Prompt too long for {} ({} characters). Maximum length: {} characters",
                model, prompt_chars, self.max_prompt_chars
            ));
        }
        if let Some(size) = params.size {
            if !self.sizes.contains(&size) {
                errors.push(format!(
                    "Invalid size '{}' for {}. Valid sizes: {}",
                    size,
                    model,
                    self.sizes.join(", ")
                ));
            }
        }
        if let Some(quality) = params.quality {
            if !self.qualities.contains(&quality) {
                errors.push(format!(
                    "Invalid quality '{}' for {}. Valid qualities: {}",
                    quality,
                    model,
                    self.qualities.join(", ")
                ));
            }
        }
        if let Some(style) = params.style {
            if self.styles.is_empty() {
                errors.push(format!("Style parameter is not supported by {}", model));
            } else if !self.styles.contains(&style) {
                errors.push(format!(
                    "Invalid style '{}' for {}. Valid styles: {}",
                    style,
                    model,
                    self.styles.join(", ")
                ));
            }
        }
        if params.n < 1 || params.n > self.max_n {
            if self.max_n == 1 {
                errors.push(format!("{} only supports n=1, got n={}", model, params.n));
            } else {
                errors.push(format!(
                    "n must be between 1 and {} for {}, got n={}",
                    self.max_n, model, params.n
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ImageToolError::invalid_input(format!(
                "Parameter validation errors: {}",
                errors.join("; ")
            )))
        }
    }
}

/// Constraints on an uploaded source image.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceRule {
    pub formats: &'static [ImageFormat],
    pub max_bytes: u64,
    pub square: bool,
}

pub const DALL_E_2_SOURCE: SourceRule =
    SourceRule { formats: &[ImageFormat::Png], max_bytes: 4 * MIB, square: true };

pub const GPT_IMAGE_1_EDIT_SOURCE: SourceRule = SourceRule {
    formats: &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP],
    max_bytes: 50 * MIB,
    square: false,
};

/// Variations always go through dall-e-2.
pub const VARIATION_SOURCE: SourceRule = DALL_E_2_SOURCE;

pub const MAX_VARIATIONS: u32 = 10;
pub const DEFAULT_VARIATIONS: u32 = 2;
pub const DEFAULT_VARIATION_SIZE: &str = "1024x1024";

impl SourceRule {
    pub fn check(&self, label: &str, info: &ImageInfo, file_size: u64) -> Result<(), ImageToolError> {
        if !self.formats.contains(&info.format) {
            let allowed: Vec<String> =
                self.formats.iter().map(|f| crate::inspect::format_name(*f)).collect();
            return Err(ImageToolError::invalid_input(format!(
                "{} must be {} (got {})",
                label,
                allowed.join(", "),
                crate::inspect::format_name(info.format)
            )));
        }
        if file_size >= self.max_bytes {
            return Err(ImageToolError::invalid_input(format!(
                "{} must be less than {} MB (got {:.2} MB)",
                label,
                self.max_bytes / MIB,
                file_size as f64 / MIB as f64
            )));
        }
        if self.square && !info.is_square() {
            return Err(ImageToolError::invalid_input(format!(
                "{} must be square (got {}x{})",
                label, info.width, info.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(prompt: &str, n: u32) -> ImageRequestParams<'_> {
        ImageRequestParams { prompt, n, ..Default::default() }
    }

    fn png_info(width: u32, height: u32) -> ImageInfo {
        ImageInfo { format: ImageFormat::Png, width, height }
    }

    #[test]
    fn test_parse_models() {
        assert_eq!("dall-e-3".parse::<ImageModel>().unwrap(), ImageModel::DallE3);
        assert_eq!("GPT-IMAGE-1".parse::<ImageModel>().unwrap(), ImageModel::GptImage1);
        assert_eq!("midjourney".parse::<ImageModel>().unwrap_err().kind(), "invalid_input");
    }

    #[test]
    fn test_spec_table_matches_model() {
        for model in ImageModel::ALL {
            assert_eq!(model.spec().model, model);
        }
    }

    #[test]
    fn test_dalle3_rejects_n_2() {
        let err = DALL_E_3.validate(&params("a cat", 2)).unwrap_err();
        assert!(err.to_string().contains("only supports n=1"));
    }

    #[test]
    fn test_dalle2_accepts_batch() {
        assert!(DALL_E_2.validate(&params("a cat", 10)).is_ok());
        assert!(DALL_E_2.validate(&params("a cat", 11)).is_err());
        assert!(DALL_E_2.validate(&params("a cat", 0)).is_err());
    }

    #[test]
    fn test_size_and_quality_checked_per_model() {
        let p = ImageRequestParams { size: Some("1792x1024"), quality: Some("hd"), ..params("x", 1) };
        assert!(DALL_E_3.validate(&p).is_ok());
        let err = DALL_E_2.validate(&p).unwrap_err().to_string();
        assert!(err.contains("Invalid size '1792x1024'"));
        assert!(err.contains("Invalid quality 'hd'"));
    }

    #[test]
    fn test_style_only_for_dalle3() {
        let p = ImageRequestParams { style: Some("vivid"), ..params("x", 1) };
        assert!(DALL_E_3.validate(&p).is_ok());
        assert!(GPT_IMAGE_1.validate(&p).unwrap_err().to_string().contains("not supported"));
    }

    #[test]
    fn test_prompt_length_limit() {
        let long = "a".repeat(1001);
        assert!(DALL_E_2.validate(&params(&long, 1)).is_err());
        assert!(DALL_E_3.validate(&params(&long, 1)).is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(GPT_IMAGE_1.validate(&params("  ", 1)).is_err());
    }

    #[test]
    fn test_edit_rules() {
        assert!(ImageModel::DallE3.edit_rule().is_none());
        let jpeg = ImageInfo { format: ImageFormat::Jpeg, width: 30, height: 20 };
        assert!(GPT_IMAGE_1_EDIT_SOURCE.check("Image", &jpeg, 1024).is_ok());
        assert!(DALL_E_2_SOURCE.check("Image", &jpeg, 1024).is_err());
    }

    #[test]
    fn test_variation_source_must_be_square() {
        let err = VARIATION_SOURCE.check("Image", &png_info(30, 20), 1024).unwrap_err();
        assert!(err.to_string().contains("must be square"));
        assert!(VARIATION_SOURCE.check("Image", &png_info(32, 32), 1024).is_ok());
    }

    #[test]
    fn test_source_byte_ceiling() {
        let err = VARIATION_SOURCE.check("Image", &png_info(8, 8), 4 * MIB).unwrap_err();
        assert!(err.to_string().contains("less than 4 MB"));
    }
}
