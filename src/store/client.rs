use super::ObjectStore;
use crate::error::StorageErrorKind;
use crate::keys::{ObjectKey, UrlScheme};
use crate::models::Config;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    urls: UrlScheme,
}

impl S3ObjectStore {
    /// Wrap an already-authenticated client.
    pub fn new(client: S3Client, bucket: String, urls: UrlScheme) -> Self {
        Self {
            client,
            bucket,
            urls,
        }
    }

    /// Build a client from ambient credentials (`AWS_ACCESS_KEY_ID` and
    /// friends, profiles, or instance metadata) for the configured endpoint.
    pub async fn connect(config: &Config) -> Result<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.store_region.clone()))
            .endpoint_url(&config.store_endpoint)
            // Retries are owned by the pipeline so they can be classified.
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            // Cloud Storage's XML API rejects the newer default checksum trailers.
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        tracing::info!(
            "Object store client ready (endpoint: {}, bucket: {})",
            config.store_endpoint,
            config.bucket
        );

        Ok(Self::new(
            S3Client::from_conf(s3_config),
            config.bucket.clone(),
            config.url_scheme(),
        ))
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

fn classify<E>(err: &SdkError<E, HttpResponse>) -> StorageErrorKind {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageErrorKind::Transient
        }
        SdkError::ServiceError(_) => match status_of(err) {
            Some(401 | 403) => StorageErrorKind::PermissionDenied,
            Some(408 | 429) => StorageErrorKind::Transient,
            Some(status) if status >= 500 => StorageErrorKind::Transient,
            _ => StorageErrorKind::Other,
        },
        _ => StorageErrorKind::Other,
    }
}

fn storage_error<E>(operation: &'static str, key: &ObjectKey, err: SdkError<E, HttpResponse>) -> Error
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    let kind = classify(&err);
    let message = match err.code() {
        Some(code) => format!("{}: {}", code, DisplayErrorContext(&err)),
        None => DisplayErrorContext(&err).to_string(),
    };
    Error::Storage {
        operation,
        key: key.to_string(),
        kind,
        message,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &ObjectKey, data: &[u8], content_type: &str) -> Result<()> {
        let body = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| storage_error("put", key, e))?;

        Ok(())
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false)
                    || status_of(&e) == Some(404);
                if not_found {
                    Ok(false)
                } else {
                    Err(storage_error("exists", key, e))
                }
            }
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if status_of(&e) == Some(404) => {
                tracing::debug!("Delete of {} found nothing to remove", key);
                Ok(())
            }
            Err(e) => Err(storage_error("delete", key, e)),
        }
    }

    fn url_scheme(&self) -> &UrlScheme {
        &self.urls
    }
}
