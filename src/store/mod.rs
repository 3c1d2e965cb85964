//! Object store integration for transcoded assets
//!
//! Assets live in an S3-compatible bucket (Cloud Storage through its
//! interoperability endpoint in production). The client is built once from
//! ambient credentials and shared read-only across requests.

pub mod client;
pub mod mock;

pub use client::S3ObjectStore;
pub use mock::MockObjectStore;

use crate::keys::{ObjectKey, UrlScheme};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &ObjectKey, data: &[u8], content_type: &str) -> Result<()>;
    async fn exists(&self, key: &ObjectKey) -> Result<bool>;
    /// Deleting an absent key is not an error here; callers that care check
    /// `exists` first.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;
    fn url_scheme(&self) -> &UrlScheme;

    fn public_url(&self, key: &ObjectKey) -> String {
        self.url_scheme().public_url(key)
    }
}
