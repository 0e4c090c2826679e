//! Local image inspection: format sniffing, dimensions and metadata.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ColorType, ImageFormat};
use serde::Serialize;

use crate::error::ImageToolError;

/// Format and dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// Detailed metadata for `get_image_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub path: PathBuf,
    pub file_name: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub color_mode: String,
    pub file_size: u64,
    pub extension: String,
    pub parent: PathBuf,
}

impl ImageMetadata {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn total_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Read format and dimensions without decoding pixel data.
pub fn probe(path: &Path) -> Result<ImageInfo, ImageToolError> {
    let reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| read_error(path, e))?;
    let format = reader.format().ok_or_else(|| {
        ImageToolError::invalid_input(format!("Unrecognized image data in '{}'", path.display()))
    })?;
    let (width, height) = reader.into_dimensions().map_err(|e| decode_error(path, e))?;
    Ok(ImageInfo { format, width, height })
}

/// Like [`probe`], but over bytes already read from `path`.
pub fn probe_bytes(path: &Path, bytes: &[u8]) -> Result<ImageInfo, ImageToolError> {
    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| read_error(path, e))?;
    let format = reader.format().ok_or_else(|| {
        ImageToolError::invalid_input(format!("Unrecognized image data in '{}'", path.display()))
    })?;
    let (width, height) = reader.into_dimensions().map_err(|e| decode_error(path, e))?;
    Ok(ImageInfo { format, width, height })
}

/// Decode the image and collect its metadata. Never touches the cache.
pub fn read_metadata(path: &Path) -> Result<ImageMetadata, ImageToolError> {
    let file_size = fs::metadata(path).map_err(|e| read_error(path, e))?.len();
    let reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| read_error(path, e))?;
    let format = reader.format();
    let image = reader.decode().map_err(|e| decode_error(path, e))?;

    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(ImageMetadata {
        file_name: file_name_of(path),
        format: format.map(format_name).unwrap_or_else(|| "UNKNOWN".to_string()),
        width: image.width(),
        height: image.height(),
        color_mode: color_mode(image.color()).to_string(),
        file_size,
        extension: path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default(),
        parent: absolute.parent().map(Path::to_path_buf).unwrap_or_default(),
        path: absolute,
    })
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Upper-case display name of a format (`PNG`, `JPEG`, ...).
pub fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

pub fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Preferred file extension for saving bytes of a format.
pub fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        _ => "png",
    }
}

pub fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "L;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F32",
        ColorType::Rgba32F => "RGBA;F32",
        _ => "UNKNOWN",
    }
}

fn read_error(path: &Path, e: std::io::Error) -> ImageToolError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ImageToolError::not_found(format!("Image '{}' does not exist", path.display()))
    } else {
        ImageToolError::invalid_input(format!("Failed to read image '{}': {}", path.display(), e))
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> ImageToolError {
    ImageToolError::invalid_input(format!("Failed to decode image '{}': {}", path.display(), e))
}
