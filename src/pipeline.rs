//! Upload and deletion pipelines.
//!
//! Upload: stage raw bytes, decode, optionally fit into the bounding box,
//! encode to WebP, name the object, put it, release staging, return the
//! public URL. Deletion runs the URL mapping backwards and removes the
//! object. Both are bounded by a shared pool of permits.

use crate::codec::{ImageCodec, WebpCodec};
use crate::error::DeleteFailure;
use crate::keys::{validate_group_id, ObjectKey};
use crate::models::{Config, EncodeOptions, StagedAsset, StoredAsset};
use crate::resize::fit_within;
use crate::retry::{with_retry, RetryPolicy};
use crate::staging::{Staging, StagingMode};
use crate::store::{ObjectStore, S3ObjectStore};
use crate::{Error, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

/// Settings the pipeline reads on every call. Fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_options: EncodeOptions,
    pub staging: StagingMode,
    pub temp_dir: PathBuf,
    pub max_concurrent: usize,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_options: config.encode,
            staging: config.staging,
            temp_dir: config.temp_dir.clone(),
            max_concurrent: config.max_concurrent,
            call_timeout: config.call_timeout,
            retry: config.retry,
        }
    }
}

/// Injectable service bundle used to construct [`AssetPipeline`].
pub struct PipelineServices {
    pub store: Arc<dyn ObjectStore>,
    pub codec: Arc<dyn ImageCodec>,
}

/// What the blocking transcode step hands back besides the staging guard.
struct Transcoded {
    width: u32,
    height: u32,
    content_type: &'static str,
    extension: &'static str,
}

pub struct AssetPipeline {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn ImageCodec>,
    settings: PipelineSettings,
    permits: Arc<Semaphore>,
}

impl AssetPipeline {
    /// Build a pipeline from concrete service dependencies.
    ///
    /// Tests and harnesses use this to inject mocks.
    pub fn with_services(services: PipelineServices, settings: PipelineSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            store: services.store,
            codec: services.codec,
            settings,
            permits,
        }
    }

    /// Construct the production pipeline: S3-compatible store from ambient
    /// credentials and the configured WebP codec.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = S3ObjectStore::connect(config).await?;
        let codec = WebpCodec::new(config.encoder, config.quality_fallback);
        info!(
            "Asset pipeline ready (encoder: {}, staging: {}, workers: {})",
            config.encoder, config.staging, config.max_concurrent
        );

        Ok(Self::with_services(
            PipelineServices {
                store: Arc::new(store),
                codec: Arc::new(codec),
            },
            PipelineSettings::from(config),
        ))
    }

    /// Upload with the configured default encode options.
    pub async fn upload(&self, raw: &[u8], group_id: &str) -> Result<StoredAsset> {
        let options = self.settings.default_options;
        self.upload_with(raw, group_id, &options).await
    }

    pub async fn upload_with(
        &self,
        raw: &[u8],
        group_id: &str,
        options: &EncodeOptions,
    ) -> Result<StoredAsset> {
        let permit = self.acquire_permit().await?;
        self.within_budget("upload", self.run_upload(permit, raw, group_id, *options))
            .await
    }

    /// Delete the asset behind `url`. Fails with `AssetNotFound` without
    /// issuing a delete when the object is absent.
    pub async fn delete_one(&self, url: &str) -> Result<()> {
        let _permit = self.acquire_permit().await?;
        self.within_budget("delete", self.delete_url(url)).await
    }

    /// Delete every asset in `urls`, continuing past failures.
    ///
    /// All resolvable, present assets are removed. If anything failed, the
    /// returned `BatchDelete` error lists each failed URL with its cause.
    pub async fn delete_many<I, S>(&self, urls: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _permit = self.acquire_permit().await?;

        let mut deleted = 0usize;
        let mut failures = Vec::new();
        for url in urls {
            let url = url.as_ref();
            match self.within_budget("delete", self.delete_url(url)).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    warn!("Failed to delete {}: {}", url, error);
                    failures.push(DeleteFailure {
                        url: url.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            "Batch delete finished: {} deleted, {} failed",
            deleted,
            failures.len()
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::BatchDelete { failures })
        }
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Invariant("worker pool closed".to_string()))
    }

    async fn within_budget<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let after = self.settings.call_timeout;
        tokio::time::timeout(after, work)
            .await
            .map_err(|_| Error::Timeout { operation, after })?
    }

    async fn run_upload(
        &self,
        permit: OwnedSemaphorePermit,
        raw: &[u8],
        group_id: &str,
        options: EncodeOptions,
    ) -> Result<StoredAsset> {
        // Reject a bad group before paying for the transcode.
        validate_group_id(group_id)?;

        let staging = Staging::acquire(self.settings.staging, &self.settings.temp_dir, raw)?;

        // The permit travels with the blocking task, so a timed-out upload
        // keeps its slot until the transcode has actually stopped.
        let codec = Arc::clone(&self.codec);
        let (_permit, transcoded) = tokio::task::spawn_blocking(move || {
            let transcoded = transcode(codec.as_ref(), staging, &options);
            (permit, transcoded)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Transcode task join error: {}", e)))?;
        let (staging, transcoded) = transcoded?;

        let asset = StagedAsset {
            key: ObjectKey::generate(group_id, transcoded.extension)?,
            content: staging.output()?.into_owned(),
            content_type: transcoded.content_type,
        };

        let put = with_retry(&self.settings.retry, "put", || {
            self.store
                .put(&asset.key, &asset.content, asset.content_type)
        })
        .await;
        staging.release();
        put?;

        let url = self.store.public_url(&asset.key);
        info!(
            "Uploaded {} ({} bytes, {}x{}, lossless: {})",
            asset.key,
            asset.content.len(),
            transcoded.width,
            transcoded.height,
            options.lossless
        );

        Ok(StoredAsset {
            url,
            size_bytes: asset.content.len(),
            key: asset.key.into_string(),
            content_type: asset.content_type.to_string(),
            width: transcoded.width,
            height: transcoded.height,
        })
    }

    async fn delete_url(&self, url: &str) -> Result<()> {
        let key = self.store.url_scheme().resolve_key(url)?;

        let exists = with_retry(&self.settings.retry, "exists", || self.store.exists(&key)).await?;
        if !exists {
            return Err(Error::AssetNotFound {
                key: key.into_string(),
            });
        }

        with_retry(&self.settings.retry, "delete", || self.store.delete(&key)).await?;
        info!("Deleted {}", key);
        Ok(())
    }
}

/// Decode, resize and encode on a blocking thread. On error the staging
/// guard is dropped here, which removes anything it staged.
fn transcode(
    codec: &dyn ImageCodec,
    mut staging: Staging,
    options: &EncodeOptions,
) -> Result<(Staging, Transcoded)> {
    let image = codec.decode(&staging.input()?)?;
    let image = match options.resize_bounds() {
        Some((max_width, max_height)) => fit_within(image, max_width, max_height),
        None => image,
    };

    let (width, height) = (image.width(), image.height());
    let encoded = codec.encode(&image, options)?;
    drop(image);

    staging.stage_output(&encoded.bytes, encoded.extension)?;
    Ok((
        staging,
        Transcoded {
            width,
            height,
            content_type: encoded.content_type,
            extension: encoded.extension,
        },
    ))
}
