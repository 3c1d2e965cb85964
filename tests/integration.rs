use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use portfolio_assets::{
    codec::{QualityFallback, WebpBackend, WebpCodec},
    keys::UrlScheme,
    models::{Config, EncodeOptions},
    pipeline::{AssetPipeline, PipelineServices, PipelineSettings},
    retry::RetryPolicy,
    staging::StagingMode,
    store::{MockObjectStore, ObjectStore},
    Error,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BUCKET: &str = "portfolio-test";

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    }));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn pipeline_with(
    store: &MockObjectStore,
    backend: WebpBackend,
    fallback: QualityFallback,
    temp_dir: &Path,
) -> AssetPipeline {
    let mut config = Config::new(BUCKET);
    config.encode = EncodeOptions::lossy(0.8).with_bounds(32, 32);
    config.temp_dir = temp_dir.to_path_buf();
    config.staging = StagingMode::Disk;
    config.retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));

    AssetPipeline::with_services(
        PipelineServices {
            store: Arc::new(store.clone()),
            codec: Arc::new(WebpCodec::new(backend, fallback)),
        },
        PipelineSettings::from(&config),
    )
}

fn store() -> MockObjectStore {
    MockObjectStore::new().with_url_scheme(UrlScheme::new("storage.googleapis.com", BUCKET))
}

fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_png_upload_then_delete_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::Libwebp,
        QualityFallback::EncoderDefault,
        temp.path(),
    );

    let asset = pipeline
        .upload(&encoded(64, 48, ImageFormat::Png), "project-1")
        .await
        .unwrap();

    assert!(asset
        .url
        .starts_with("https://storage.googleapis.com/portfolio-test/project-1/"));
    assert!(asset.url.ends_with(".webp"));
    assert_eq!(asset.content_type, "image/webp");

    let stored = &store.get_objects()[&asset.key];
    assert_eq!(stored.content_type, "image/webp");
    let decoded = image::load_from_memory_with_format(&stored.data, ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert_eq!(staged_files(temp.path()), 0);

    pipeline.delete_one(&asset.url).await.unwrap();
    assert!(store.get_objects().is_empty());

    let err = pipeline.delete_one(&asset.url).await.unwrap_err();
    assert!(matches!(err, Error::AssetNotFound { .. }));
}

#[tokio::test]
async fn test_jpeg_lossless_upload_keeps_dimensions() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::Libwebp,
        QualityFallback::EncoderDefault,
        temp.path(),
    );

    let asset = pipeline
        .upload_with(
            &encoded(80, 40, ImageFormat::Jpeg),
            "7",
            &EncodeOptions::lossless(),
        )
        .await
        .unwrap();

    assert_eq!((asset.width, asset.height), (80, 40));
    let stored = &store.get_objects()[&asset.key];
    assert_eq!(&stored.data[0..4], b"RIFF");
    assert_eq!(&stored.data[8..12], b"WEBP");
}

#[tokio::test]
async fn test_undecodable_upload_leaves_no_staged_files() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::Libwebp,
        QualityFallback::EncoderDefault,
        temp.path(),
    );

    let err = pipeline
        .upload(b"this is a text file", "7")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "decode");
    assert_eq!(store.get_put_count(), 0);
    assert_eq!(staged_files(temp.path()), 0);
}

#[tokio::test]
async fn test_rejected_lossy_encode_leaves_no_staged_files() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::PureRust,
        QualityFallback::Reject,
        temp.path(),
    );

    let err = pipeline
        .upload(&encoded(16, 16, ImageFormat::Png), "7")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Encode { .. }));
    assert_eq!(store.get_put_count(), 0);
    assert_eq!(staged_files(temp.path()), 0);
}

#[tokio::test]
async fn test_pure_rust_backend_falls_back_for_lossy_requests() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::PureRust,
        QualityFallback::EncoderDefault,
        temp.path(),
    );

    let asset = pipeline
        .upload(&encoded(64, 64, ImageFormat::Png), "7")
        .await
        .unwrap();

    // Still resized: only the compression settings fall back.
    assert_eq!((asset.width, asset.height), (32, 32));
    let key = store.url_scheme().resolve_key(&asset.url).unwrap();
    assert_eq!(key.as_str(), asset.key);
    assert_eq!(store.public_url(&key), asset.url);
}

#[tokio::test]
async fn test_batch_delete_reports_only_missing_assets() {
    let temp = TempDir::new().unwrap();
    let store = store();
    let pipeline = pipeline_with(
        &store,
        WebpBackend::Libwebp,
        QualityFallback::EncoderDefault,
        temp.path(),
    );

    let png = encoded(8, 8, ImageFormat::Png);
    let first = pipeline.upload(&png, "album").await.unwrap();
    let third = pipeline.upload(&png, "album").await.unwrap();
    let missing = format!(
        "https://storage.googleapis.com/{}/album/00000000-0000-0000-0000-000000000000.webp",
        BUCKET
    );

    let err = pipeline
        .delete_many([first.url.as_str(), missing.as_str(), third.url.as_str()])
        .await
        .unwrap_err();

    assert!(store.get_objects().is_empty());
    match err {
        Error::BatchDelete { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].url, missing);
            assert!(matches!(failures[0].error, Error::AssetNotFound { .. }));
        }
        other => panic!("expected BatchDelete, got {other:?}"),
    }
}
