//! Prompt templates for the analysis tools.

use std::fmt;
use std::str::FromStr;

use crate::error::ImageToolError;

pub const DEFAULT_DESCRIBE_PROMPT: &str = "Please describe this image in detail.";
pub const DEFAULT_COMPARISON_FOCUS: &str = "similarities and differences";

/// Focus of an `analyze_image_content` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisType {
    #[default]
    General,
    Objects,
    Text,
    Colors,
    Composition,
    Emotions,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 6] = [
        Self::General,
        Self::Objects,
        Self::Text,
        Self::Colors,
        Self::Composition,
        Self::Emotions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Objects => "objects",
            Self::Text => "text",
            Self::Colors => "colors",
            Self::Composition => "composition",
            Self::Emotions => "emotions",
        }
    }

    /// Instruction sent to the vision model for this analysis type.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::General => {
                "Provide a comprehensive description of this image, including objects, people, \
                 setting, and overall composition."
            }
            Self::Objects => {
                "Identify and list all objects, items, and things visible in this image. Be \
                 specific and detailed."
            }
            Self::Text => {
                "Extract and transcribe any text, signs, labels, or written content visible in \
                 this image."
            }
            Self::Colors => {
                "Analyze the color palette, dominant colors, and color scheme of this image. \
                 Describe the mood created by the colors."
            }
            Self::Composition => {
                "Analyze the composition, framing, perspective, lighting, and artistic elements \
                 of this image."
            }
            Self::Emotions => {
                "Describe the emotions, mood, and feelings conveyed by this image. What emotional \
                 response might it evoke?"
            }
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = ImageToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted).ok_or_else(|| {
            let choices: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
            ImageToolError::invalid_input(format!(
                "Invalid analysis type '{}'. Choose from: {}",
                s,
                choices.join(", ")
            ))
        })
    }
}

/// Prompt for a two-image comparison.
pub fn comparison_prompt(focus: &str) -> String {
    format!(
        "You are given two images. The first image is shown first, the second image is shown \
         second. Compare them with a focus on {}. Describe each image briefly, then explain \
         their similarities and differences.",
        focus
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_types() {
        for t in AnalysisType::ALL {
            assert_eq!(t.as_str().parse::<AnalysisType>().unwrap(), t);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Colors".parse::<AnalysisType>().unwrap(), AnalysisType::Colors);
    }

    #[test]
    fn test_parse_invalid_lists_choices() {
        let err = "vibes".parse::<AnalysisType>().unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("general, objects, text, colors, composition, emotions"));
    }

    #[test]
    fn test_prompts_are_distinct() {
        let mut prompts: Vec<&str> = AnalysisType::ALL.iter().map(|t| t.prompt()).collect();
        prompts.sort();
        prompts.dedup();
        assert_eq!(prompts.len(), AnalysisType::ALL.len());
    }

    #[test]
    fn test_comparison_prompt_mentions_focus() {
        assert!(comparison_prompt("colors").contains("focus on colors"));
    }
}
