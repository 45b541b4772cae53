//! Persistence backends for the video slot
//!
//! Every backend is a tiny key-value capability. Remote stores (Cloudflare R2 /
//! AWS S3, or a REST key-value service) take priority; a local JSON file is the
//! fallback.

use crate::config::StorageSettings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// The single key under which the video state is stored.
pub const VIDEO_STATE_KEY: &str = "video_state";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error putting object into S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// HTTP error talking to the REST key-value store
    #[error("KV HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
    /// The backend answered with something it should not have
    #[error("Unexpected backend response: {0}")]
    Unexpected(String),
}

/// Which kind of backend served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Cloudflare R2 / S3 bucket
    R2,
    /// REST key-value store
    RestKv,
    /// Local JSON file
    File,
    /// In-process store used by tests and dry runs
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::R2 => "r2",
            Self::RestKv => "rest-kv",
            Self::File => "file",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Interface for key-value persistence backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read the value stored under `key`, `None` if nothing was ever written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Backend kind, for logs and save outcomes.
    fn kind(&self) -> BackendKind;
}

/// R2-backed storage implementation
pub struct R2Backend {
    client: Client,
    bucket: String,
}

impl R2Backend {
    /// Create a new R2 backend
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.clone(),
        })
    }

    /// Check that the bucket is reachable
    ///
    /// # Errors
    ///
    /// Returns a printable error if the bucket cannot be reached.
    pub async fn check_connection(&self) -> Result<(), String> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Successfully connected to R2 bucket {}.", self.bucket);
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}

#[async_trait]
impl KvBackend for R2Backend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();
                let text = String::from_utf8(data.to_vec())
                    .map_err(|e| StorageError::Unexpected(e.to_string()))?;
                Ok(Some(text))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .body(ByteStream::from(value.as_bytes().to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::R2
    }
}

/// Returns the R2 object key for a logical key
#[must_use]
pub fn object_key(key: &str) -> String {
    format!("{key}.json")
}

/// REST key-value store (Upstash / Vercel KV wire format).
pub struct RestKvBackend {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct KvResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RestKvBackend {
    /// Create a new REST KV backend
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is missing, or the HTTP client cannot be built.
    pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let base_url = settings
            .kv_rest_api_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("KV_REST_API_URL is missing".into()))?;
        let token = settings
            .kv_rest_api_token
            .as_ref()
            .ok_or_else(|| StorageError::Config("KV_REST_API_TOKEN is missing".into()))?;

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.clone(),
        })
    }

    async fn decode(response: reqwest::Response) -> Result<KvResponse, StorageError> {
        let status = response.status();
        let body: KvResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(StorageError::Unexpected(format!("{status}: {err}")));
        }
        if !status.is_success() {
            return Err(StorageError::Unexpected(format!("HTTP {status}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl KvBackend for RestKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let response = self
            .http
            .get(format!("{}/get/{key}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        match Self::decode(response).await?.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(StorageError::Unexpected(format!(
                "non-string value under {key}: {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let response = self
            .http
            .post(format!("{}/set/{key}", self.base_url))
            .bearer_auth(&self.token)
            .body(value.to_string())
            .send()
            .await?;

        Self::decode(response).await?;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RestKv
    }
}

/// Local JSON file backend: one `{key}.json` file per key under a directory.
///
/// Writes truncate the file in place; a crash mid-write may leave it corrupt.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a file backend rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Directory holding the state files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}

/// The backends a slot persists to, chosen once at startup.
#[derive(Clone)]
pub struct StateBackends {
    /// Authoritative remote store, if configured
    pub primary: Option<Arc<dyn KvBackend>>,
    /// Local store used when no remote store is configured or it is unreachable
    pub fallback: Arc<dyn KvBackend>,
}

impl StateBackends {
    /// Pair an optional primary with a fallback.
    #[must_use]
    pub fn new(primary: Option<Arc<dyn KvBackend>>, fallback: Arc<dyn KvBackend>) -> Self {
        Self { primary, fallback }
    }

    /// Select backends from configuration: R2 first, then REST KV, file always as fallback.
    ///
    /// A remote backend that fails to initialise is logged and skipped.
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let fallback: Arc<dyn KvBackend> = Arc::new(FileBackend::new(&settings.state_dir));

        if settings.has_partial_r2() {
            warn!("R2 settings are incomplete; ignoring R2 backend.");
        }
        if settings.has_partial_rest_kv() {
            warn!("KV_REST_API_URL and KV_REST_API_TOKEN must both be set; ignoring REST KV backend.");
        }

        let primary: Option<Arc<dyn KvBackend>> = if settings.has_r2() {
            match R2Backend::new(settings).await {
                Ok(backend) => {
                    info!("R2 backend initialized.");
                    if backend.check_connection().await.is_err() {
                        error!("R2 connection check returned error.");
                    }
                    Some(Arc::new(backend))
                }
                Err(e) => {
                    error!("Failed to initialize R2 backend: {}", e);
                    None
                }
            }
        } else if settings.has_rest_kv() {
            match RestKvBackend::new(settings) {
                Ok(backend) => {
                    info!("REST KV backend initialized.");
                    Some(Arc::new(backend))
                }
                Err(e) => {
                    error!("Failed to initialize REST KV backend: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if primary.is_none() {
            info!(
                "Using local file backend at {}",
                FileBackend::new(&settings.state_dir)
                    .path_for(VIDEO_STATE_KEY)
                    .display()
            );
        }

        Self { primary, fallback }
    }
}
