//! Object storage
//!
//! Uploaded files (avatars, certificates, product images, event render
//! documents) live behind the [`ObjectStorage`] trait. The local backend is a
//! directory tree served back through signed `/statics` URLs; the http backend
//! talks to an S3-compatible bucket endpoint.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::Utc;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{StorageConfig, StorageProvider};
use crate::models::common::{FileObject, SupportCertificateMime, SupportImageMime};
use crate::services::http::{build_client, send_with_retry, RetryPolicy};
use crate::utils::errors::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Storage backend operations
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Read an object; a missing object is `NotFound`
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn delete(&self, path: &str) -> Result<bool>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Objects stored as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an object path into the root, refusing anything that escapes it
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(AppError::Storage(format!("invalid object path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path = %path, "Object written");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("file not found")),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }
}

/// Objects stored in an S3-compatible bucket reachable over HTTP
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpObjectStorage {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy: RetryPolicy::with_timeout(timeout_seconds),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let request = self
            .client
            .put(self.object_url(path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        send_with_retry(request, &self.policy).await?;
        debug!(path = %path, "Object uploaded");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        match send_with_retry(self.client.get(self.object_url(path)), &self.policy).await {
            Ok(response) => Ok(response.bytes().await?.to_vec()),
            Err(AppError::Http(e)) if e.status() == Some(StatusCode::NOT_FOUND) => {
                Err(AppError::not_found("file not found"))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        match send_with_retry(self.client.delete(self.object_url(path)), &self.policy).await {
            Ok(_) => Ok(true),
            Err(AppError::Http(e)) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        match send_with_retry(self.client.head(self.object_url(path)), &self.policy).await {
            Ok(_) => Ok(true),
            Err(AppError::Http(e)) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Storage facade used by handlers
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn ObjectStorage>,
    config: StorageConfig,
    signer: HmacSha256,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("provider", &self.config.provider)
            .field("public_url", &self.config.public_url)
            .finish()
    }
}

impl StorageService {
    /// Create the service with the configured backend
    pub fn new(config: StorageConfig) -> Result<Self> {
        let backend: Arc<dyn ObjectStorage> = match config.provider {
            StorageProvider::Local => Arc::new(LocalStorage::new(&config.root_dir)),
            StorageProvider::Http => {
                let base_url = config
                    .base_url
                    .clone()
                    .ok_or_else(|| AppError::Config("storage.base_url is required for the http provider".into()))?;
                Arc::new(HttpObjectStorage::new(base_url, config.timeout_seconds)?)
            }
        };
        info!(provider = ?config.provider, "Object storage initialized");
        Self::with_backend(backend, config)
    }

    pub fn with_backend(backend: Arc<dyn ObjectStorage>, config: StorageConfig) -> Result<Self> {
        let signer = <HmacSha256 as KeyInit>::new_from_slice(config.signing_key.as_bytes())
            .map_err(|e| AppError::Config(format!("invalid storage signing key: {}", e)))?;
        Ok(Self {
            backend,
            config,
            signer,
        })
    }

    pub async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.backend.put(path, bytes, content_type).await
    }

    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.backend.get(path).await
    }

    pub async fn delete(&self, path: &str) -> Result<bool> {
        self.backend.delete(path).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.backend.exists(path).await
    }

    /// Signed URL valid for `url_ttl_seconds`
    pub fn access_url(&self, path: &str) -> String {
        let expires = Utc::now().timestamp() + self.config.url_ttl_seconds as i64;
        self.access_url_at(path, expires)
    }

    fn access_url_at(&self, path: &str, expires: i64) -> String {
        format!(
            "{}/{}?expires={}&signature={}",
            self.config.public_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            expires,
            self.sign(path, expires)
        )
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.signer.clone();
        mac.update(path.trim_start_matches('/').as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    fn sign(&self, path: &str, expires: i64) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(path, expires).finalize().into_bytes())
    }

    /// Check a signature produced by [`StorageService::access_url`]
    pub fn verify_signature(&self, path: &str, expires: i64, signature: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(raw) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.mac(path, expires).verify_slice(&raw).is_ok()
    }

    pub async fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.get(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn write_json<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(path, bytes, "application/json").await
    }

    /// Object content as a `data:` URI
    pub async fn data_uri(&self, file: &FileObject) -> Result<String> {
        let bytes = self.get(&file.file_path).await?;
        Ok(format!("data:{};base64,{}", file.file_type, STANDARD.encode(bytes)))
    }

    /// Store an image at `{base_path}.{ext}`
    pub async fn upload_image(&self, base_path: &str, content_type: &str, bytes: Vec<u8>) -> Result<FileObject> {
        let mime = SupportImageMime::parse(content_type).ok_or_else(|| AppError::forbidden("unsupported file type"))?;
        let path = format!("{}.{}", base_path, mime.extension());
        self.put(&path, bytes, mime.as_str()).await?;
        Ok(FileObject::new(path, mime.as_str()))
    }

    /// Store a certificate document at `{base_path}.{ext}`
    pub async fn upload_certificate(&self, base_path: &str, content_type: &str, bytes: Vec<u8>) -> Result<FileObject> {
        let mime =
            SupportCertificateMime::parse(content_type).ok_or_else(|| AppError::forbidden("unsupported file type"))?;
        let path = format!("{}.{}", base_path, mime.extension());
        self.put(&path, bytes, mime.as_str()).await?;
        Ok(FileObject::new(path, mime.as_str()))
    }
}

/// Hex SHA-256 digest reported back after uploads
pub fn checksum(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn local_service(dir: &TempDir) -> StorageService {
        let mut config = Settings::default().storage;
        config.root_dir = dir.path().to_string_lossy().to_string();
        StorageService::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_local_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let storage = local_service(&dir);

        storage.put("a/b/file.txt", b"hello".to_vec(), "text/plain").await.unwrap();
        assert!(storage.exists("a/b/file.txt").await.unwrap());
        assert_eq!(storage.get("a/b/file.txt").await.unwrap(), b"hello");

        assert!(storage.delete("a/b/file.txt").await.unwrap());
        assert!(!storage.delete("a/b/file.txt").await.unwrap());
        assert_matches!(storage.get("a/b/file.txt").await, Err(AppError::NotFound(_)));
    }

    #[test]
    fn test_traversal_refused() {
        let local = LocalStorage::new("/tmp/root");
        assert!(local.resolve("../etc/passwd").is_err());
        assert!(local.resolve("/etc/passwd").is_err());
        assert!(local.resolve("a/../../b").is_err());
        assert!(local.resolve("").is_err());
        assert_eq!(local.resolve("a/b.png").unwrap(), PathBuf::from("/tmp/root/a/b.png"));
    }

    #[tokio::test]
    async fn test_json_and_data_uri() {
        let dir = TempDir::new().unwrap();
        let storage = local_service(&dir);

        storage.write_json("org-events/render/e.json", &json!({ "p1": { "pathname": "/" } })).await.unwrap();
        let doc: serde_json::Value = storage.read_json("org-events/render/e.json").await.unwrap();
        assert_eq!(doc["p1"]["pathname"], "/");

        storage.put("certificates/u/id.pdf", b"%PDF".to_vec(), "application/pdf").await.unwrap();
        let uri = storage
            .data_uri(&FileObject::new("certificates/u/id.pdf", "application/pdf"))
            .await
            .unwrap();
        assert_eq!(uri, "data:application/pdf;base64,JVBERg==");
    }

    #[tokio::test]
    async fn test_upload_validates_mime() {
        let dir = TempDir::new().unwrap();
        let storage = local_service(&dir);

        let file = storage
            .upload_image("account-avatar/Organization/u1", "image/png", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(file.file_path, "account-avatar/Organization/u1.png");
        assert_eq!(file.file_type, "image/png");

        assert_matches!(
            storage.upload_image("x", "application/pdf", vec![]).await,
            Err(AppError::Forbidden(_))
        );
        let cert = storage
            .upload_certificate("certificates/u1/identification_document", "application/pdf", vec![1])
            .await
            .unwrap();
        assert_eq!(cert.file_path, "certificates/u1/identification_document.pdf");
        assert_matches!(
            storage.upload_certificate("x", "image/svg+xml", vec![]).await,
            Err(AppError::Forbidden(_))
        );
    }

    #[test]
    fn test_signed_urls() {
        let dir = TempDir::new().unwrap();
        let storage = local_service(&dir);

        let url = storage.access_url("account-avatar/default.png");
        assert!(url.starts_with("http://localhost:8000/statics/account-avatar/default.png?expires="));

        let parsed = url::Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        let expires: i64 = params["expires"].parse().unwrap();
        let signature = &params["signature"];

        assert!(storage.verify_signature("account-avatar/default.png", expires, signature));
        assert!(!storage.verify_signature("account-avatar/other.png", expires, signature));
        assert!(!storage.verify_signature("account-avatar/default.png", expires + 1, signature));

        let past = Utc::now().timestamp() - 5;
        let stale = storage.sign("account-avatar/default.png", past);
        assert!(!storage.verify_signature("account-avatar/default.png", past, &stale));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_signatures_depend_on_signing_key() {
        let backend: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new("/tmp"));
        let mut config = Settings::default().storage;
        config.signing_key = "first-key".to_string();
        let first = StorageService::with_backend(backend.clone(), config.clone()).unwrap();
        config.signing_key = "second-key".to_string();
        let second = StorageService::with_backend(backend, config).unwrap();

        let expires = Utc::now().timestamp() + 60;
        let signature = first.sign("logo.png", expires);
        assert_eq!(signature, first.sign("logo.png", expires));
        assert!(first.verify_signature("logo.png", expires, &signature));
        assert!(!second.verify_signature("logo.png", expires, &signature));
    }

    #[test]
    fn test_http_provider_requires_base_url() {
        let mut config = Settings::default().storage;
        config.provider = StorageProvider::Http;
        config.base_url = None;
        assert_matches!(StorageService::new(config), Err(AppError::Config(_)));
    }

    proptest! {
        #[test]
        fn prop_signature_roundtrip(path in "[a-z]{1,8}(/[a-z0-9]{1,8}){0,3}\\.png") {
            let storage = StorageService::with_backend(
                Arc::new(LocalStorage::new("/tmp")),
                Settings::default().storage,
            )
            .unwrap();
            let expires = Utc::now().timestamp() + 60;
            let signature = storage.sign(&path, expires);
            prop_assert!(storage.verify_signature(&path, expires, &signature));
        }
    }
}
