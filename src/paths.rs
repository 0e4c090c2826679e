//! Path resolution and image path validation for tool arguments.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::ImageToolError;

/// Raster formats accepted by the analysis tools (lowercase extensions).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Resolve a user-supplied path. Relative paths are taken from the current
/// working directory; absolute paths are returned unchanged.
pub fn resolve_path(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// Lowercased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

/// Check if a path has one of the supported raster extensions.
pub fn is_supported_image(path: &Path) -> bool {
    extension_of(path).map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str())).unwrap_or(false)
}

/// Resolve and validate an image path argument.
///
/// `label` names the argument in error messages (e.g. "image", "first image").
pub fn validate_image_path(raw: &str, label: &str) -> Result<PathBuf, ImageToolError> {
    if raw.trim().is_empty() {
        return Err(ImageToolError::invalid_input(format!("{} path must not be empty", label)));
    }

    let path = resolve_path(raw);
    if !path.exists() {
        return Err(ImageToolError::not_found(format!(
            "{} file '{}' does not exist (resolved to {})",
            label,
            raw,
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(ImageToolError::invalid_input(format!(
            "{} path '{}' is not a regular file",
            label, raw
        )));
    }
    if !is_supported_image(&path) {
        return Err(ImageToolError::invalid_input(format!(
            "Unsupported image format for '{}'. Supported formats: {}",
            raw,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(path)
}
