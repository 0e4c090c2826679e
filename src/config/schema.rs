//! Configuration schema types for `imagecraft.toml`
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_SUBDIR;
use crate::openai::{DEFAULT_MAX_TOKENS, DEFAULT_OPENAI_BASE_URL, DEFAULT_VISION_MODEL};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Analysis cache section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disable to send every analysis call to the API
    pub enabled: bool,
    /// Cache directory (default: `<system temp>/ai_image_analysis_cache`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Entry lifetime in days
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, dir: None, ttl_days: 30 }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_CACHE_SUBDIR))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }
}

/// OpenAI API section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    /// Chat model used for image analysis
    pub vision_model: String,
    pub max_tokens: u32,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `imagecraft=debug`. `RUST_LOG` wins.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

/// Root of `imagecraft.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagecraftConfig {
    pub cache: CacheConfig,
    pub openai: OpenAiConfig,
    pub logging: LoggingConfig,
}

/// A single config validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Dotted path to the invalid field (e.g., "openai.timeout_secs")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "imagecraft.toml: '{}' {}", self.field, self.message)
    }
}

impl ImagecraftConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut fail = |field: &str, message: &str| {
            errors.push(ConfigValidationError { field: field.to_string(), message: message.to_string() })
        };

        if self.cache.ttl_days == 0 {
            fail("cache.ttl_days", "must be a positive integer");
        }
        if !self.openai.base_url.starts_with("http://") && !self.openai.base_url.starts_with("https://") {
            fail("openai.base_url", "must be an http(s) URL");
        }
        if self.openai.vision_model.trim().is_empty() {
            fail("openai.vision_model", "must be a non-empty string");
        }
        if self.openai.max_tokens == 0 {
            fail("openai.max_tokens", "must be a positive integer");
        }
        if self.openai.timeout_secs == 0 {
            fail("openai.timeout_secs", "must be a positive integer");
        }
        if self.logging.level.trim().is_empty() {
            fail("logging.level", "must be a non-empty filter directive");
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
