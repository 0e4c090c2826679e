//! Cache-through orchestration of vision analysis calls.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::prompts::{comparison_prompt, AnalysisType, DEFAULT_COMPARISON_FOCUS, DEFAULT_DESCRIBE_PROMPT};
use crate::cache::{
    fingerprint_bytes, CacheEntry, CacheKeyBuilder, CacheStats, CacheStore, Fingerprint,
    OperationKind,
};
use crate::error::ImageToolError;
use crate::inspect::{self, ImageInfo, ImageMetadata};
use crate::openai::{VisionImage, VisionProvider, VisionRequest};
use crate::paths::validate_image_path;

/// Largest image accepted for analysis.
pub const MAX_ANALYSIS_BYTES: u64 = 20 * 1024 * 1024;

/// Per-image details recorded alongside the model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedImage {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// What gets cached: everything needed to rebuild the tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub text: String,
    pub model: String,
    pub images: Vec<AnalyzedImage>,
}

/// Where an analysis result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache, no external call.
    Hit,
    /// Fresh external call; the result was offered to the cache.
    Miss,
    /// Fresh external call with no cache involvement (disabled or unusable).
    Bypassed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub payload: AnalysisPayload,
    pub cache_status: CacheStatus,
}

impl AnalysisOutcome {
    pub fn from_cache(&self) -> bool {
        self.cache_status == CacheStatus::Hit
    }
}

/// A validated source image, read once. The fingerprint, the probed info
/// and the bytes sent to the model all come from the same buffer.
struct Source {
    path: PathBuf,
    info: ImageInfo,
    bytes: Vec<u8>,
}

impl Source {
    fn load(raw: &str, label: &str) -> Result<Self, ImageToolError> {
        let path = validate_image_path(raw, label)?;
        let size = fs::metadata(&path)
            .map_err(|e| {
                ImageToolError::invalid_input(format!("Cannot stat {} '{}': {}", label, raw, e))
            })?
            .len();
        if size > MAX_ANALYSIS_BYTES {
            return Err(ImageToolError::invalid_input(format!(
                "{} '{}' is too large ({} bytes). Maximum size is {} bytes",
                label, raw, size, MAX_ANALYSIS_BYTES
            )));
        }
        let bytes = fs::read(&path).map_err(|e| {
            ImageToolError::invalid_input(format!("Failed to read {} '{}': {}", label, raw, e))
        })?;
        let info = inspect::probe_bytes(&path, &bytes)?;
        Ok(Self { path, info, bytes })
    }

    fn fingerprint(&self) -> Fingerprint {
        fingerprint_bytes(&self.bytes)
    }

    fn analyzed(&self) -> AnalyzedImage {
        AnalyzedImage {
            file_name: inspect::file_name_of(&self.path),
            width: self.info.width,
            height: self.info.height,
            format: inspect::format_name(self.info.format),
        }
    }

    fn vision_image(&self) -> VisionImage {
        VisionImage {
            mime: inspect::mime_type(self.info.format).to_string(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Runs describe / analyze / compare through the cache and the vision model,
/// and serves metadata locally.
#[derive(Debug)]
pub struct AnalysisDispatcher {
    vision: Arc<dyn VisionProvider>,
    cache: Option<CacheStore>,
}

impl AnalysisDispatcher {
    pub fn new(vision: Arc<dyn VisionProvider>, cache: Option<CacheStore>) -> Self {
        Self { vision, cache }
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub async fn describe(
        &self,
        image_path: &str,
        prompt: Option<&str>,
    ) -> Result<AnalysisOutcome, ImageToolError> {
        let prompt = match prompt.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => DEFAULT_DESCRIBE_PROMPT.to_string(),
        };
        let source = Source::load(image_path, "image")?;

        let key = CacheKeyBuilder::new(OperationKind::Describe).param("prompt", prompt.as_str());
        self.run(key, &[source], prompt).await
    }

    pub async fn analyze(
        &self,
        image_path: &str,
        analysis_type: AnalysisType,
    ) -> Result<AnalysisOutcome, ImageToolError> {
        let prompt = analysis_type.prompt().to_string();
        let source = Source::load(image_path, "image")?;

        let key = CacheKeyBuilder::new(OperationKind::Analyze)
            .param("analysis_type", analysis_type.as_str())
            .param("prompt", prompt.as_str());
        self.run(key, &[source], prompt).await
    }

    /// Compare two images in a single model call.
    ///
    /// The cache key is order-sensitive: swapping the images is a different
    /// request because the answer refers to "first" and "second".
    pub async fn compare(
        &self,
        image1_path: &str,
        image2_path: &str,
        focus: Option<&str>,
    ) -> Result<AnalysisOutcome, ImageToolError> {
        let focus = match focus.map(str::trim) {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => DEFAULT_COMPARISON_FOCUS.to_string(),
        };
        let first = Source::load(image1_path, "first image")?;
        let second = Source::load(image2_path, "second image")?;

        let key = CacheKeyBuilder::new(OperationKind::Compare).param("focus", focus.as_str());
        self.run(key, &[first, second], comparison_prompt(&focus)).await
    }

    /// Local metadata extraction. Not cached.
    pub fn metadata(&self, image_path: &str) -> Result<ImageMetadata, ImageToolError> {
        let path = validate_image_path(image_path, "image")?;
        inspect::read_metadata(&path)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(CacheStore::stats)
    }

    /// Clear the cache, returning the number of entries removed.
    pub fn clear_cache(&self) -> usize {
        self.cache.as_ref().map(CacheStore::clear).unwrap_or(0)
    }

    async fn run(
        &self,
        key: CacheKeyBuilder,
        sources: &[Source],
        prompt: String,
    ) -> Result<AnalysisOutcome, ImageToolError> {
        let key = key.param("model", self.vision.model());
        let cached = self.cache.as_ref().map(|cache| {
            (cache, sources.iter().map(Source::fingerprint).fold(key, CacheKeyBuilder::fingerprint))
        });

        if let Some((cache, key)) = &cached {
            if let Some(payload) = lookup(cache, key) {
                return Ok(AnalysisOutcome { payload, cache_status: CacheStatus::Hit });
            }
        }

        let images = sources.iter().map(Source::vision_image).collect();
        let response = self.vision.analyze(VisionRequest { prompt, images }).await?;
        let payload = AnalysisPayload {
            text: response.text,
            model: response.model,
            images: sources.iter().map(Source::analyzed).collect(),
        };

        let cache_status = match &cached {
            Some((cache, key)) => {
                store(cache, key, &payload);
                CacheStatus::Miss
            }
            None => CacheStatus::Bypassed,
        };

        Ok(AnalysisOutcome { payload, cache_status })
    }
}

/// Cache read with every failure treated as a miss.
fn lookup(cache: &CacheStore, key: &CacheKeyBuilder) -> Option<AnalysisPayload> {
    let cache_key = key.build();
    let entry = match cache.get(&cache_key) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            tracing::debug!(key = %cache_key, "cache miss");
            return None;
        }
        Err(e) => {
            let degraded = ImageToolError::cache_degraded(e.to_string());
            tracing::warn!(key = %cache_key, error = %degraded, "cache read failed, forcing miss");
            return None;
        }
    };

    if entry.fingerprints != key.fingerprints() {
        tracing::debug!(key = %cache_key, "cached fingerprints differ, treating as miss");
        return None;
    }

    match serde_json::from_value::<AnalysisPayload>(entry.payload) {
        Ok(payload) => {
            tracing::debug!(key = %cache_key, "cache hit");
            Some(payload)
        }
        Err(e) => {
            tracing::warn!(key = %cache_key, error = %e, "unreadable cached payload, forcing miss");
            None
        }
    }
}

/// Cache write-through. Failures are logged, never returned.
fn store(cache: &CacheStore, key: &CacheKeyBuilder, payload: &AnalysisPayload) {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode analysis payload for cache");
            return;
        }
    };
    let entry = CacheEntry::new(key, value);
    if let Err(e) = cache.put(&entry) {
        let degraded = ImageToolError::cache_degraded(e.to_string());
        tracing::warn!(key = %entry.key, error = %degraded, "cache write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::openai::{ProviderError, ServiceErrorKind, VisionResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct FakeVision {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        fail_with: Option<ServiceErrorKind>,
    }

    #[async_trait]
    impl VisionProvider for FakeVision {
        async fn analyze(&self, request: VisionRequest) -> Result<VisionResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if let Some(kind) = self.fail_with {
                return Err(ProviderError::new(kind, "simulated failure"));
            }
            Ok(VisionResponse {
                text: format!("analysis #{} of {} image(s)", n, request.images.len()),
                model: "fake-vision".into(),
                total_tokens: None,
            })
        }

        fn model(&self) -> &str {
            "fake-vision"
        }
    }

    fn png(dir: &Path, name: &str, shade: u8) -> String {
        let path = dir.join(name);
        image::RgbImage::from_pixel(4, 4, image::Rgb([shade, 0, 0])).save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn setup() -> (TempDir, Arc<FakeVision>, AnalysisDispatcher) {
        let dir = TempDir::new().unwrap();
        let vision = Arc::new(FakeVision::default());
        let cache = CacheStore::new(dir.path().join("cache"), DEFAULT_TTL);
        let dispatcher = AnalysisDispatcher::new(vision.clone(), Some(cache));
        (dir, vision, dispatcher)
    }

    #[tokio::test]
    async fn test_describe_second_call_hits_cache() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "a.png", 10);

        let first = dispatcher.describe(&img, None).await.unwrap();
        let second = dispatcher.describe(&img, None).await.unwrap();

        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(first.payload, second.payload);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_describe_uses_default_prompt() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "a.png", 10);

        dispatcher.describe(&img, Some("   ")).await.unwrap();
        assert_eq!(vision.prompts.lock().unwrap()[0], DEFAULT_DESCRIBE_PROMPT);
    }

    #[tokio::test]
    async fn test_different_prompts_are_separate_entries() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "a.png", 10);

        dispatcher.describe(&img, Some("What animals?")).await.unwrap();
        dispatcher.describe(&img, Some("What colors?")).await.unwrap();

        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.cache_stats().unwrap().entry_count, 2);
    }

    #[tokio::test]
    async fn test_analyze_records_payload_details() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "scene.png", 10);

        let outcome = dispatcher.analyze(&img, AnalysisType::Text).await.unwrap();
        assert_eq!(outcome.payload.model, "fake-vision");
        assert_eq!(outcome.payload.images[0].file_name, "scene.png");
        assert_eq!(outcome.payload.images[0].format, "PNG");
        assert_eq!(vision.prompts.lock().unwrap()[0], AnalysisType::Text.prompt());
    }

    #[tokio::test]
    async fn test_compare_is_order_sensitive() {
        let (dir, vision, dispatcher) = setup();
        let a = png(dir.path(), "a.png", 10);
        let b = png(dir.path(), "b.png", 200);

        let ab = dispatcher.compare(&a, &b, None).await.unwrap();
        let ba = dispatcher.compare(&b, &a, None).await.unwrap();
        let ab_again = dispatcher.compare(&a, &b, None).await.unwrap();

        assert_eq!(ab.cache_status, CacheStatus::Miss);
        assert_eq!(ba.cache_status, CacheStatus::Miss);
        assert_eq!(ab_again.cache_status, CacheStatus::Hit);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ab.payload.images.len(), 2);
        assert_eq!(ab.payload.images[0].file_name, "a.png");
    }

    #[tokio::test]
    async fn test_external_failure_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let vision = Arc::new(FakeVision {
            fail_with: Some(ServiceErrorKind::Quota),
            ..Default::default()
        });
        let cache = CacheStore::new(dir.path().join("cache"), DEFAULT_TTL);
        let dispatcher = AnalysisDispatcher::new(vision, Some(cache));
        let img = png(dir.path(), "a.png", 10);

        let err = dispatcher.describe(&img, None).await.unwrap_err();
        assert!(matches!(
            err,
            ImageToolError::ExternalService { kind: ServiceErrorKind::Quota, .. }
        ));
        assert_eq!(dispatcher.cache_stats().unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_external_call() {
        let (dir, vision, dispatcher) = setup();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "hi").unwrap();

        let err = dispatcher.describe(txt.to_str().unwrap(), None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        let err = dispatcher.describe("/nonexistent/a.png", None).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_without_cache_is_bypassed() {
        let dir = TempDir::new().unwrap();
        let vision = Arc::new(FakeVision::default());
        let dispatcher = AnalysisDispatcher::new(vision.clone(), None);
        let img = png(dir.path(), "a.png", 10);

        let first = dispatcher.describe(&img, None).await.unwrap();
        let second = dispatcher.describe(&img, None).await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::Bypassed);
        assert_eq!(second.cache_status, CacheStatus::Bypassed);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
        assert!(dispatcher.cache_stats().is_none());
        assert_eq!(dispatcher.clear_cache(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_forces_miss() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "a.png", 10);
        dispatcher.describe(&img, None).await.unwrap();

        // Replace the payload with something that is valid JSON but not a payload
        let cache = dispatcher.cache().unwrap();
        for path in glob::glob(&format!("{}/*.json", cache.root().display())).unwrap() {
            let path = path.unwrap();
            let mut entry: CacheEntry =
                serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            entry.payload = serde_json::json!({"unexpected": true});
            cache.put(&entry).unwrap();
        }

        let outcome = dispatcher.describe(&img, None).await.unwrap();
        assert_eq!(outcome.cache_status, CacheStatus::Miss);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
    }

    /// Overwrites the source image while the model "works" on it.
    #[derive(Debug)]
    struct RewritingVision {
        target: PathBuf,
        sent: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl VisionProvider for RewritingVision {
        async fn analyze(&self, request: VisionRequest) -> Result<VisionResponse, ProviderError> {
            *self.sent.lock().unwrap() = request.images[0].bytes.clone();
            image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 255])).save(&self.target).unwrap();
            Ok(VisionResponse { text: "red square".into(), model: "fake-vision".into(), total_tokens: None })
        }

        fn model(&self) -> &str {
            "fake-vision"
        }
    }

    #[tokio::test]
    async fn test_entry_is_keyed_by_the_bytes_analyzed() {
        let dir = TempDir::new().unwrap();
        let img = png(dir.path(), "a.png", 200);
        let vision = Arc::new(RewritingVision { target: PathBuf::from(&img), sent: Mutex::default() });
        let cache = CacheStore::new(dir.path().join("cache"), DEFAULT_TTL);
        let dispatcher = AnalysisDispatcher::new(vision.clone(), Some(cache));

        dispatcher.describe(&img, None).await.unwrap();

        let cache = dispatcher.cache().unwrap();
        let entries: Vec<CacheEntry> = glob::glob(&format!("{}/*.json", cache.root().display()))
            .unwrap()
            .map(|p| serde_json::from_str(&fs::read_to_string(p.unwrap()).unwrap()).unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fingerprints, vec![fingerprint_bytes(&vision.sent.lock().unwrap())]);

        // The file on disk changed underneath, so its analysis is not served
        let after = dispatcher.describe(&img, None).await.unwrap();
        assert_eq!(after.cache_status, CacheStatus::Miss);
    }

    #[test]
    fn test_metadata_is_local() {
        let (dir, vision, dispatcher) = setup();
        let img = png(dir.path(), "m.png", 10);

        let meta = dispatcher.metadata(&img).unwrap();
        assert_eq!((meta.width, meta.height), (4, 4));
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.cache_stats().unwrap().entry_count, 0);
    }
}
