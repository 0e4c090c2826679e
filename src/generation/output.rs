//! Saving generated images and scanning output directories.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ImageToolError;
use crate::inspect;
use crate::paths::{is_supported_image, resolve_path};

pub const DEFAULT_GENERATED_DIR: &str = "generated_images";
pub const DEFAULT_EDITED_DIR: &str = "edited_images";
pub const DEFAULT_VARIATIONS_DIR: &str = "image_variations";

/// Keep only characters safe in a file name; fall back to `default` when
/// nothing usable remains.
pub fn sanitize_prefix(raw: Option<&str>, default: &str) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned
    }
}

/// `<prefix>_<timestamp>_<index>`, without extension.
pub fn file_stem(prefix: &str, timestamp: i64, index: usize) -> String {
    format!("{}_{}_{}", prefix, timestamp, index)
}

/// File extension matching the encoded bytes, `png` when unrecognized.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes).map(inspect::extension_for).unwrap_or("png")
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, String> {
    STANDARD.decode(data.trim()).map_err(|e| format!("invalid base64 image data: {}", e))
}

/// Create an output directory relative to the working directory.
pub fn prepare_output_dir(raw: Option<&str>, default: &str) -> Result<PathBuf, ImageToolError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
    let dir = resolve_path(raw);
    fs::create_dir_all(&dir).map_err(|e| {
        ImageToolError::invalid_input(format!(
            "Cannot create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}

/// Write `bytes` as `<stem>.<ext>` under `dir`, never replacing an existing
/// file: a `-<n>` suffix is appended to the stem until the name is free.
pub fn save_image(dir: &Path, stem: &str, bytes: &[u8]) -> Result<PathBuf, String> {
    if bytes.is_empty() {
        return Err("image data was empty".to_string());
    }
    let ext = sniff_extension(bytes);

    let mut attempt = 0usize;
    loop {
        let name = match attempt {
            0 => format!("{}.{}", stem, ext),
            n => format!("{}-{}.{}", stem, n, ext),
        };
        let path = dir.join(name);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                write_or_discard(file, &path, bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(format!("failed to create {}: {}", path.display(), e)),
        }
    }
}

/// Write `bytes` to a freshly created file, removing it again if the write
/// fails so no truncated image is left behind.
fn write_or_discard<W: Write>(mut file: W, path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %remove_err, "could not remove partial image");
        }
        return Err(format!("failed to write {}: {}", path.display(), e));
    }
    Ok(())
}

/// One image file found in an output directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedImageRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

impl GeneratedImageRecord {
    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// List the images in `dir`, newest first. No index is kept; this is a scan.
pub fn list_images(dir: &Path) -> Result<Vec<GeneratedImageRecord>, ImageToolError> {
    if !dir.exists() {
        return Err(ImageToolError::not_found(format!(
            "Directory '{}' does not exist",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(ImageToolError::invalid_input(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        ImageToolError::invalid_input(format!("Cannot read directory '{}': {}", dir.display(), e))
    })?;

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_supported_image(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_default();
        let info = inspect::probe(&path).ok();

        records.push(GeneratedImageRecord {
            file_name: inspect::file_name_of(&path),
            size_bytes: meta.len(),
            modified,
            width: info.map(|i| i.width),
            height: info.map(|i| i.height),
            format: info.map(|i| inspect::format_name(i.format)),
            path,
        });
    }

    records.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.file_name.cmp(&b.file_name)));
    Ok(records)
}
