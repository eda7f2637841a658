use async_trait::async_trait;
use aws_sdk_s3 as s3;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::DEFAULT_AVATAR;

/// UploadedFile
///
/// Raw bytes pulled out of a multipart field, together with the metadata the
/// storage layer needs to produce a durable URL.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// StorageService
///
/// Abstract contract for the media store. Handlers only ever see opaque URLs:
/// they hand bytes in, get a stable retrieval URL back, and later hand that
/// URL back for best-effort removal. The concrete client (S3/MinIO) can be
/// swapped for the in-memory mock in tests without touching any handler.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup to
    /// provision the MinIO bucket automatically. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Uploads raw bytes under a logical folder tag and returns the public
    /// retrieval URL. The object key is server-generated from a UUID plus the
    /// original file extension; the caller's filename never reaches the store
    /// verbatim.
    async fn store(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<String, String>;

    /// Best-effort removal of an object previously returned by `store`. URLs
    /// this service did not produce are ignored. Callers log failures and
    /// carry on; media removal is never fatal to the enclosing operation.
    async fn remove(&self, url: &str) -> Result<(), String>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application
/// state.
pub type StorageState = Arc<dyn StorageService>;

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) from a key segment to
/// prevent path traversal through user-supplied names.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// file_extension
///
/// Extension of an uploaded filename, falling back to "bin" when there is
/// none.
fn file_extension(filename: &str) -> &str {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin")
}

/// S3StorageClient
///
/// Concrete implementation using the AWS SDK for S3. S3 compatibility means
/// this client transparently handles a Dockerized MinIO instance locally and
/// any S3 gateway in production. `force_path_style(true)` is required for
/// MinIO-style endpoints, and also makes the public object URL predictable:
/// `{endpoint}/{bucket}/{key}`.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client using credentials and configuration from
    /// AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required
            // for MinIO and most S3-compatible gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket_name, key)
    }

    /// Reverses `public_url`: extracts the object key from a URL this client
    /// produced, or None for foreign URLs (default assets, external avatars).
    fn key_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", self.endpoint, self.bucket_name);
        url.strip_prefix(&prefix).map(str::to_string)
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Calls the S3 CreateBucket API. S3 APIs are idempotent, so this only
    /// creates the bucket if it does not already exist. Safe at startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let key = sanitize_key(&format!(
            "{}/{}.{}",
            folder,
            Uuid::new_v4(),
            file_extension(filename)
        ));

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(self.public_url(&key))
    }

    async fn remove(&self, url: &str) -> Result<(), String> {
        // Foreign URLs (default assets, user-provided avatar links) are not
        // ours to delete.
        let Some(key) = self.key_from_url(url) else {
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

/// MockStorageService
///
/// In-memory implementation used by unit and integration tests. Uploads are
/// recorded and produce deterministic local-style URLs; `should_fail`
/// simulates a media store outage for the fatal-upload-failure paths.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, all store operations return a simulated failure.
    pub should_fail: bool,
    /// Keys of every stored object, for assertions.
    pub stored: Mutex<Vec<String>>,
    /// URLs passed to `remove`, for best-effort-delete assertions.
    pub removed: Mutex<Vec<String>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn store(
        &self,
        _bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let key = sanitize_key(&format!("{}/{}", folder, filename));
        self.stored.lock().unwrap().push(key.clone());

        Ok(format!("http://localhost:9000/mock-bucket/{}", key))
    }

    async fn remove(&self, url: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        self.removed.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// resolve_author_image
///
/// Explicit precedence chain for the byline avatar attached to a blog:
/// an uploaded file wins, then an explicit URL string, then the author's
/// stored avatar, then the default placeholder asset. Exactly one normalized
/// URL comes out; an upload failure at the top of the chain is fatal, like any
/// other media failure inside create/update.
pub async fn resolve_author_image(
    storage: &StorageState,
    uploaded: Option<UploadedFile>,
    url_input: Option<String>,
    stored_avatar: Option<&str>,
) -> Result<String, ApiError> {
    if let Some(file) = uploaded {
        return storage
            .store(file.bytes, "author_images", &file.filename, &file.content_type)
            .await
            .map_err(|e| {
                tracing::error!("author image upload failed: {}", e);
                ApiError::Upload("Failed to upload author image".to_string())
            });
    }

    if let Some(url) = url_input.filter(|u| !u.is_empty()) {
        return Ok(url);
    }

    if let Some(avatar) = stored_avatar.filter(|a| !a.is_empty()) {
        return Ok(avatar.to_string());
    }

    Ok(DEFAULT_AVATAR.to_string())
}
