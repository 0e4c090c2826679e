//! Generation dispatcher behavior against a scripted image provider.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imagecraft::generation::{
    EditParams, GenerateParams, GenerationDispatcher, ImageModel, VariationParams,
};
use imagecraft::openai::{
    EditRequest, GenerateRequest, ImageDatum, ImageProvider, ImagesResponse, ProviderError,
    ServiceErrorKind, VariationRequest,
};
use imagecraft::ImageToolError;
use tempfile::TempDir;

/// Returns a fixed batch and records what it was asked for.
#[derive(Debug, Default)]
struct ScriptedImages {
    batch: Vec<ImageDatum>,
    fail_with: Option<ServiceErrorKind>,
    edits: Mutex<Vec<(ImageModel, u8, bool)>>,
    variations: Mutex<Vec<(String, u8)>>,
}

impl ScriptedImages {
    fn reply(&self) -> Result<ImagesResponse, ProviderError> {
        match self.fail_with {
            Some(kind) => Err(ProviderError::new(kind, "HTTP 429: You exceeded your current quota")),
            None => Ok(ImagesResponse { data: self.batch.clone(), usage: None }),
        }
    }
}

#[async_trait]
impl ImageProvider for ScriptedImages {
    async fn generate(&self, _request: GenerateRequest) -> Result<ImagesResponse, ProviderError> {
        self.reply()
    }

    async fn edit(&self, request: EditRequest) -> Result<ImagesResponse, ProviderError> {
        self.edits.lock().unwrap().push((request.model, request.n, request.mask.is_some()));
        self.reply()
    }

    async fn create_variation(
        &self,
        request: VariationRequest,
    ) -> Result<ImagesResponse, ProviderError> {
        self.variations.lock().unwrap().push((request.size, request.n));
        self.reply()
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::new(ServiceErrorKind::Network, "connection reset"))
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbaImage::new(width, height).write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn good() -> ImageDatum {
    ImageDatum { b64_json: Some(STANDARD.encode(png_bytes(4, 4))), ..Default::default() }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn edit_params(dir: &Path, source: &Path, n: u32) -> EditParams {
    EditParams {
        image_path: path_str(source),
        prompt: "put a party hat on it".into(),
        mask_path: None,
        model: ImageModel::GptImage1,
        size: None,
        quality: Some("high".into()),
        n: Some(n),
        output_dir: Some(path_str(&dir.join("edited"))),
        filename_prefix: None,
    }
}

#[tokio::test]
async fn test_dalle3_rejects_more_than_one_image() {
    let dir = TempDir::new().unwrap();
    let dispatcher = GenerationDispatcher::new(Arc::new(ScriptedImages::default()));

    let err = dispatcher
        .generate(GenerateParams {
            prompt: "a lighthouse".into(),
            model: ImageModel::DallE3,
            size: Some("1024x1024".into()),
            quality: Some("hd".into()),
            style: Some("vivid".into()),
            n: Some(2),
            output_dir: Some(path_str(&dir.path().join("gen"))),
            filename_prefix: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ImageToolError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_partial_edit_batch_keeps_successes() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src.jpg");
    image::RgbImage::new(12, 8).save(&source).unwrap();
    let broken = ImageDatum { b64_json: Some("!!not-base64!!".into()), ..Default::default() };
    let provider =
        Arc::new(ScriptedImages { batch: vec![good(), broken, good()], ..Default::default() });
    let dispatcher = GenerationDispatcher::new(provider.clone());

    let outcome = dispatcher.edit(edit_params(dir.path(), &source, 3)).await.unwrap();

    let saved = outcome.saved_paths();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|p| p.exists()));
    assert_eq!(outcome.failures().len(), 1);
    assert!(matches!(
        outcome.partial_failure(),
        Some(ImageToolError::PartialFailure { succeeded: 2, requested: 3 })
    ));
    assert_eq!(*provider.edits.lock().unwrap(), vec![(ImageModel::GptImage1, 3, false)]);
}

#[tokio::test]
async fn test_failed_download_is_an_item_failure() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src.png");
    fs::write(&source, png_bytes(8, 8)).unwrap();
    let by_url = ImageDatum { url: Some("https://cdn.example/1.png".into()), ..Default::default() };
    let dispatcher = GenerationDispatcher::new(Arc::new(ScriptedImages {
        batch: vec![good(), by_url],
        ..Default::default()
    }));

    let outcome = dispatcher.edit(edit_params(dir.path(), &source, 2)).await.unwrap();
    let failures = outcome.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.contains("connection reset"));
}

#[tokio::test]
async fn test_provider_error_surfaces_with_kind() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src.png");
    fs::write(&source, png_bytes(8, 8)).unwrap();
    let dispatcher = GenerationDispatcher::new(Arc::new(ScriptedImages {
        fail_with: Some(ServiceErrorKind::Quota),
        ..Default::default()
    }));

    let err = dispatcher.edit(edit_params(dir.path(), &source, 1)).await.unwrap_err();
    assert_eq!(err.kind(), "external_service");
    assert!(err.to_string().contains("(quota)"));
}

#[tokio::test]
async fn test_non_square_variation_source_rejected() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("banner.png");
    fs::write(&source, png_bytes(16, 9)).unwrap();
    let provider = Arc::new(ScriptedImages::default());
    let dispatcher = GenerationDispatcher::new(provider.clone());

    let err = dispatcher
        .create_variations(VariationParams { image_path: path_str(&source), ..Default::default() })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_input");
    assert!(provider.variations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_variation_source_must_be_png() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("square.jpg");
    image::RgbImage::new(8, 8).save(&source).unwrap();
    let dispatcher = GenerationDispatcher::new(Arc::new(ScriptedImages::default()));

    let err = dispatcher
        .create_variations(VariationParams { image_path: path_str(&source), ..Default::default() })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("must be PNG"));
}

#[tokio::test]
async fn test_variation_request_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("square.png");
    fs::write(&source, png_bytes(8, 8)).unwrap();
    let provider = Arc::new(ScriptedImages { batch: vec![good(), good()], ..Default::default() });
    let dispatcher = GenerationDispatcher::new(provider.clone());

    dispatcher
        .create_variations(VariationParams {
            image_path: path_str(&source),
            output_dir: Some(path_str(&dir.path().join("vars"))),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(*provider.variations.lock().unwrap(), vec![("1024x1024".to_string(), 2)]);
}

#[tokio::test]
async fn test_two_calls_never_overwrite_each_other() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedImages { batch: vec![good()], ..Default::default() });
    let dispatcher = GenerationDispatcher::new(provider);
    let params = GenerateParams {
        prompt: "a fox".into(),
        model: ImageModel::GptImage1,
        size: None,
        quality: None,
        style: None,
        n: None,
        output_dir: Some(path_str(&dir.path().join("gen"))),
        filename_prefix: Some("fox".into()),
    };

    let first = dispatcher.generate(params.clone()).await.unwrap();
    let second = dispatcher.generate(params).await.unwrap();

    assert_ne!(first.saved_paths()[0], second.saved_paths()[0]);
    assert_eq!(fs::read_dir(dir.path().join("gen")).unwrap().count(), 2);
}

#[tokio::test]
async fn test_list_generated_newest_first() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedImages { batch: vec![good(), good()], ..Default::default() });
    let dispatcher = GenerationDispatcher::new(provider);
    let out = path_str(&dir.path().join("gen"));

    dispatcher
        .generate(GenerateParams {
            prompt: "two owls".into(),
            model: ImageModel::DallE2,
            size: Some("256x256".into()),
            quality: None,
            style: None,
            n: Some(2),
            output_dir: Some(out.clone()),
            filename_prefix: None,
        })
        .await
        .unwrap();

    let records = dispatcher.list_generated(Some(&out)).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].modified >= records[1].modified);
    assert_eq!(records[0].width, Some(4));
}
