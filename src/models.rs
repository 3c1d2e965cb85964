//! Data models and configuration
//!
//! Defines the values that flow through the upload and deletion pipelines
//! and the immutable service configuration loaded at startup.

use crate::codec::{QualityFallback, WebpBackend};
use crate::keys::{ObjectKey, UrlScheme};
use crate::retry::RetryPolicy;
use crate::staging::StagingMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_QUALITY: f32 = 0.6;

/// Per-call transcode settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub lossless: bool,
    /// Lossy quality in `[0.0, 1.0]`. Ignored when `lossless` is set.
    pub quality: f32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::lossy(DEFAULT_QUALITY)
    }
}

impl EncodeOptions {
    pub fn lossy(quality: f32) -> Self {
        Self {
            lossless: false,
            quality,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    pub fn lossless() -> Self {
        Self {
            lossless: true,
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Bounding box to fit the raster into, if this call resizes at all.
    /// Lossless uploads keep their original pixels.
    pub fn resize_bounds(&self) -> Option<(u32, u32)> {
        if self.lossless {
            None
        } else {
            Some((self.max_width, self.max_height))
        }
    }
}

/// Encoded bytes ready for exactly one `put`.
#[derive(Debug, Clone)]
pub struct StagedAsset {
    pub key: ObjectKey,
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

/// Outcome of a successful upload. The caller persists `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub url: String,
    pub key: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub store_host: String,
    pub store_endpoint: String,
    pub store_region: String,
    pub encode: EncodeOptions,
    pub encoder: WebpBackend,
    pub quality_fallback: QualityFallback,
    pub staging: StagingMode,
    pub temp_dir: PathBuf,
    pub max_concurrent: usize,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    /// Defaults for everything except the bucket name.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            store_host: "storage.googleapis.com".to_string(),
            store_endpoint: "https://storage.googleapis.com".to_string(),
            store_region: "auto".to_string(),
            encode: EncodeOptions::default(),
            encoder: WebpBackend::Libwebp,
            quality_fallback: QualityFallback::EncoderDefault,
            staging: StagingMode::Disk,
            temp_dir: std::env::temp_dir(),
            max_concurrent: 4,
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bucket = std::env::var("ASSET_BUCKET")
            .map_err(|_| Error::Config("ASSET_BUCKET not set".to_string()))?;
        let mut config = Self::new(bucket);

        if let Ok(host) = std::env::var("ASSET_STORE_HOST") {
            config.store_host = host;
        }
        if let Ok(endpoint) = std::env::var("ASSET_STORE_ENDPOINT") {
            config.store_endpoint = endpoint;
        }
        if let Ok(region) = std::env::var("ASSET_STORE_REGION") {
            config.store_region = region;
        }
        if let Ok(dir) = std::env::var("ASSET_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }

        config.encode.max_width = env_or("ASSET_MAX_WIDTH", config.encode.max_width)?;
        config.encode.max_height = env_or("ASSET_MAX_HEIGHT", config.encode.max_height)?;
        config.encode.lossless = env_or("ASSET_LOSSLESS", config.encode.lossless)?;
        config.encode.quality = env_or("ASSET_QUALITY", config.encode.quality)?;
        config.encoder = env_or("ASSET_ENCODER", config.encoder)?;
        config.quality_fallback = env_or("ASSET_QUALITY_FALLBACK", config.quality_fallback)?;
        config.staging = env_or("ASSET_STAGING", config.staging)?;
        config.max_concurrent = env_or("ASSET_MAX_CONCURRENT", config.max_concurrent)?;
        config.call_timeout = Duration::from_secs(env_or(
            "ASSET_CALL_TIMEOUT_SECS",
            config.call_timeout.as_secs(),
        )?);
        config.retry.max_attempts = env_or("ASSET_RETRY_ATTEMPTS", config.retry.max_attempts)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() || self.bucket.contains('/') {
            return Err(Error::Config(format!(
                "invalid bucket name '{}'",
                self.bucket
            )));
        }
        if self.encode.max_width == 0 || self.encode.max_height == 0 {
            return Err(Error::Config(
                "max width and height must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.encode.quality) {
            return Err(Error::Config(format!(
                "quality {} outside [0.0, 1.0]",
                self.encode.quality
            )));
        }
        if self.max_concurrent == 0 {
            return Err(Error::Config(
                "max concurrent uploads must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn url_scheme(&self) -> UrlScheme {
        UrlScheme::new(&self.store_host, &self.bucket)
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", name, raw, e))),
        Err(_) => Ok(default),
    }
}
