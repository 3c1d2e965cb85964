use super::ObjectStore;
use crate::error::StorageErrorKind;
use crate::keys::{ObjectKey, UrlScheme};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory bucket with call counters and failure injection.
#[derive(Clone)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, MockObject>>>,
    urls: UrlScheme,
    put_count: Arc<Mutex<usize>>,
    exists_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    transient_failures: Arc<Mutex<usize>>,
    permanent_failure: Arc<Mutex<Option<StorageErrorKind>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            urls: UrlScheme::new("storage.googleapis.com", "mock-bucket"),
            put_count: Arc::new(Mutex::new(0)),
            exists_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            transient_failures: Arc::new(Mutex::new(0)),
            permanent_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_url_scheme(mut self, urls: UrlScheme) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data,
                content_type: "image/webp".to_string(),
            },
        );
        self
    }

    /// Fail the next `count` store calls with a transient error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        *self.transient_failures.lock().unwrap() = count;
        self
    }

    /// Fail every store call with an error of `kind`.
    pub fn with_failure(self, kind: StorageErrorKind) -> Self {
        *self.permanent_failure.lock().unwrap() = Some(kind);
        self
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_exists_count(&self) -> usize {
        *self.exists_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_objects(&self) -> HashMap<String, MockObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn injected_failure(&self, operation: &'static str, key: &ObjectKey) -> Option<Error> {
        let kind = {
            let mut remaining = self.transient_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                Some(StorageErrorKind::Transient)
            } else {
                *self.permanent_failure.lock().unwrap()
            }
        };

        kind.map(|kind| Error::Storage {
            operation,
            key: key.to_string(),
            kind,
            message: "Mock failure".to_string(),
        })
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &ObjectKey, data: &[u8], content_type: &str) -> Result<()> {
        *self.put_count.lock().unwrap() += 1;
        if let Some(err) = self.injected_failure("put", key) {
            return Err(err);
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        *self.exists_count.lock().unwrap() += 1;
        if let Some(err) = self.injected_failure("exists", key) {
            return Err(err);
        }

        Ok(self.objects.lock().unwrap().contains_key(key.as_str()))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;
        if let Some(err) = self.injected_failure("delete", key) {
            return Err(err);
        }

        self.objects.lock().unwrap().remove(key.as_str());
        Ok(())
    }

    fn url_scheme(&self) -> &UrlScheme {
        &self.urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ObjectKey {
        UrlScheme::new("storage.googleapis.com", "mock-bucket")
            .resolve_key(&format!(
                "https://storage.googleapis.com/mock-bucket/{}",
                raw
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_store_put_exists_delete() {
        let store = MockObjectStore::new();
        let key = key("1/a.webp");

        store.put(&key, b"data", "image/webp").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get_objects()["1/a.webp"].content_type, "image/webp");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());

        assert_eq!(store.get_put_count(), 1);
        assert_eq!(store.get_exists_count(), 2);
        assert_eq!(store.get_delete_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_transient_failures_run_out() {
        let store = MockObjectStore::new().with_transient_failures(1);
        let key = key("1/a.webp");

        let err = store.put(&key, b"data", "image/webp").await.unwrap_err();
        assert!(err.is_transient());
        store.put(&key, b"data", "image/webp").await.unwrap();
        assert!(store.contains("1/a.webp"));
    }

    #[tokio::test]
    async fn test_mock_store_exists_can_fail() {
        let store = MockObjectStore::new()
            .with_object("1/a.webp", b"data".to_vec())
            .with_transient_failures(1);
        let key = key("1/a.webp");

        assert!(store.exists(&key).await.unwrap_err().is_transient());
        assert!(store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_store_public_url() {
        let store = MockObjectStore::new();
        assert_eq!(
            store.public_url(&key("9/b.webp")),
            "https://storage.googleapis.com/mock-bucket/9/b.webp"
        );
    }
}
