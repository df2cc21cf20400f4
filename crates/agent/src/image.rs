//! Grocery-list image access for the image processor specialist.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use base64::Engine;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::info;

use grocer_core::config::{StorageBackend, StorageConfig};

use crate::conversation::ImageFormat;
use crate::tools::{Tool, ToolOutput, ToolSpec};

pub const DOWNLOAD_IMAGE_TOOL: &str = "download_image_from_s3";
pub const IMAGE_READER_TOOL: &str = "image_reader";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject>;
}

/// Buckets are directories under `root`.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if relative.components().any(|component| !matches!(component, Component::Normal(_))) {
            bail!("object path `{bucket}/{key}` escapes the storage root");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let path = self.resolve(bucket, key)?;
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read object `{}`", path.display()))?;
        Ok(StoredObject { bytes, content_type: None })
    }
}

/// Signed `GetObject` calls through the AWS SDK.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Credentials come from the default AWS chain (environment, shared
    /// profile, container or instance role). An explicit endpoint switches to
    /// path-style addressing for S3-compatible services.
    pub async fn from_env(region: &str, endpoint: Option<&str>, timeout: Duration) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                anyhow!("failed to get s3://{bucket}/{key}: {}", DisplayErrorContext(&error))
            })?;

        let content_type = output.content_type().map(ToString::to_string);
        let body = output
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read s3://{bucket}/{key}"))?;

        Ok(StoredObject { bytes: body.into_bytes().to_vec(), content_type })
    }
}

/// Unsigned path-style GET against an S3-compatible endpoint
/// (`{endpoint}/{bucket}/{key}`). Private AWS buckets reject these requests.
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid storage endpoint `{endpoint}`"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build storage HTTP client")?;
        Ok(Self { http, endpoint })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("storage endpoint `{}` cannot carry a path", self.endpoint))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let url = self.object_url(bucket, key)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned {status}");
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await.with_context(|| format!("failed to read {url}"))?;

        Ok(StoredObject { bytes: bytes.to_vec(), content_type })
    }
}

pub async fn object_store_from_config(
    config: &StorageConfig,
    region: &str,
    timeout: Duration,
) -> Result<Arc<dyn ObjectStore>> {
    Ok(match config.backend {
        StorageBackend::S3 => {
            Arc::new(S3ObjectStore::from_env(region, config.endpoint.as_deref(), timeout).await)
        }
        StorageBackend::Local => {
            let root = config
                .root
                .clone()
                .ok_or_else(|| anyhow!("storage.root is required for the local backend"))?;
            Arc::new(LocalObjectStore::new(root))
        }
        StorageBackend::Http => Arc::new(HttpObjectStore::new(&config.endpoint_url(region), timeout)?),
    })
}

/// Accepts `{bucket, key}` or the upload payload's `{s3_bucket, s3_key}`.
fn object_location(input: &Value) -> Result<(String, String)> {
    let field = |names: [&str; 2]| {
        names
            .iter()
            .find_map(|name| input.get(*name).and_then(Value::as_str))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };

    let bucket = field(["bucket", "s3_bucket"]).ok_or_else(|| anyhow!("`bucket` is required"))?;
    let key = field(["key", "s3_key"]).ok_or_else(|| anyhow!("`key` is required"))?;
    Ok((bucket, key))
}

fn location_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bucket": { "type": "string", "description": "Bucket holding the image" },
            "key": { "type": "string", "description": "Object key of the image" }
        },
        "required": ["bucket", "key"]
    })
}

fn resolve_format(object: &StoredObject, key: &str) -> Option<ImageFormat> {
    object
        .content_type
        .as_deref()
        .and_then(ImageFormat::parse)
        .or_else(|| ImageFormat::sniff(&object.bytes))
        .or_else(|| ImageFormat::from_key(key))
}

/// Returns the object as base64 with its metadata.
pub struct DownloadImageTool {
    store: Arc<dyn ObjectStore>,
}

impl DownloadImageTool {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DownloadImageTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: DOWNLOAD_IMAGE_TOOL.to_string(),
            description: "Download an image from object storage and return it base64-encoded \
                          with its content type and size."
                .to_string(),
            input_schema: location_schema(),
        }
    }

    async fn call(&self, input: Value) -> Result<ToolOutput> {
        let (bucket, key) = object_location(&input)?;
        let object = self.store.get_object(&bucket, &key).await?;
        info!(event_name = "image.downloaded", bucket = %bucket, key = %key, size = object.bytes.len(), "downloaded image");

        let content_type = object
            .content_type
            .clone()
            .or_else(|| resolve_format(&object, &key).map(|format| format.content_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(ToolOutput::Json(json!({
            "image_base64": base64::engine::general_purpose::STANDARD.encode(&object.bytes),
            "content_type": content_type,
            "size": object.bytes.len(),
            "key": key,
        })))
    }
}

/// Hands the image itself to the model as an image content block.
pub struct ImageReaderTool {
    store: Arc<dyn ObjectStore>,
}

impl ImageReaderTool {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ImageReaderTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: IMAGE_READER_TOOL.to_string(),
            description: "Load an image from object storage so its contents can be read."
                .to_string(),
            input_schema: location_schema(),
        }
    }

    async fn call(&self, input: Value) -> Result<ToolOutput> {
        let (bucket, key) = object_location(&input)?;
        let object = self.store.get_object(&bucket, &key).await?;
        let format = resolve_format(&object, &key)
            .ok_or_else(|| anyhow!("`{key}` is not a supported image (png, jpeg, gif, webp)"))?;

        Ok(ToolOutput::Image { format, bytes: object.bytes })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::{
        DownloadImageTool, HttpObjectStore, ImageReaderTool, LocalObjectStore, ObjectStore,
    };
    use crate::conversation::ImageFormat;
    use crate::tools::{Tool, ToolOutput};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn store_with_list() -> (tempfile::TempDir, Arc<dyn ObjectStore>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = dir.path().join("grocery-uploads").join("lists");
        std::fs::create_dir_all(&uploads).expect("mkdir");
        std::fs::write(uploads.join("weekly.png"), PNG).expect("write");
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        (dir, store)
    }

    #[tokio::test]
    async fn local_store_rejects_parent_components() {
        let (_dir, store) = store_with_list();
        assert!(store.get_object("grocery-uploads", "../../etc/passwd").await.is_err());
        assert!(store.get_object("grocery-uploads", "lists/missing.png").await.is_err());
    }

    #[tokio::test]
    async fn download_returns_base64_and_metadata() {
        let (_dir, store) = store_with_list();
        let tool = DownloadImageTool::new(store);

        let output = tool
            .call(json!({"s3_bucket": "grocery-uploads", "s3_key": "lists/weekly.png"}))
            .await
            .expect("download");

        let ToolOutput::Json(body) = output else {
            panic!("expected json output");
        };
        assert_eq!(body["content_type"], "image/png");
        assert_eq!(body["size"], PNG.len());
        assert_eq!(body["key"], "lists/weekly.png");
        assert_eq!(body["image_base64"], "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn image_reader_yields_an_image_block() {
        let (_dir, store) = store_with_list();
        let tool = ImageReaderTool::new(store);

        let output = tool
            .call(json!({"bucket": "grocery-uploads", "key": "lists/weekly.png"}))
            .await
            .expect("read");
        assert_eq!(output, ToolOutput::Image { format: ImageFormat::Png, bytes: PNG.to_vec() });

        assert!(tool.call(json!({"bucket": "grocery-uploads"})).await.is_err());
    }

    #[test]
    fn http_store_uses_path_style_urls() {
        let store = HttpObjectStore::new("http://127.0.0.1:9000/", Duration::from_secs(5))
            .expect("store");
        let url = store.object_url("grocery-uploads", "lists/my list.png").expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/grocery-uploads/lists/my%20list.png");
    }
}
