//! Model storage: resolving where the model lives and fetching its bytes.
//!
//! Models are either stored in an S3 bucket (`s3a://bucket/key`) or under a
//! generic path prefix on the local filesystem.

use std::path::PathBuf;

/// File name looked up when a path location points at a directory.
pub const MODEL_FILE_NAME: &str = "model.json";

/// Where the serialized model is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    /// An object in an S3 bucket
    S3 { bucket: String, key: String },
    /// A file (or directory containing [`MODEL_FILE_NAME`])
    Path(PathBuf),
}

impl ModelLocation {
    /// Resolve a location from the storage selector, root and model name.
    ///
    /// The selector `S3` (any case) picks S3 with `root` as the bucket; any
    /// other selector treats `root` as a path prefix.
    pub fn from_args(selector: &str, root: &str, name: &str) -> Self {
        if selector.eq_ignore_ascii_case("s3") {
            ModelLocation::S3 {
                bucket: root.to_string(),
                key: name.to_string(),
            }
        } else {
            ModelLocation::Path(PathBuf::from(format!("{root}/{name}")))
        }
    }

    /// URI shown to the user.
    pub fn uri(&self) -> String {
        match self {
            ModelLocation::S3 { bucket, key } => format!("s3a://{bucket}/{key}"),
            ModelLocation::Path(path) => path.display().to_string(),
        }
    }
}

impl std::fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Connection settings for S3.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// AWS region; falls back to the environment
    pub region: Option<String>,
    /// Custom endpoint, e.g. a MinIO server
    pub endpoint: Option<String>,
}

/// Storage error types.
#[derive(Debug)]
pub enum StorageError {
    /// Reading from the local filesystem failed
    Io { path: PathBuf, message: String },
    /// The object store returned an error
    ObjectStore(String),
    /// The location needs a backend this build does not include
    Unsupported(String),
    /// The async runtime could not be created
    Runtime(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io { path, message } => {
                write!(f, "Failed to read model from {path:?}: {message}")
            }
            StorageError::ObjectStore(msg) => write!(f, "Object store error: {msg}"),
            StorageError::Unsupported(msg) => write!(f, "Unsupported model location: {msg}"),
            StorageError::Runtime(msg) => write!(f, "Storage runtime error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Fetches serialized models.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    s3: S3Settings,
}

impl ModelStore {
    /// Create a new model store.
    pub fn new(s3: S3Settings) -> Self {
        Self { s3 }
    }

    /// Fetch the raw model document.
    pub async fn fetch(&self, location: &ModelLocation) -> Result<Vec<u8>, StorageError> {
        match location {
            ModelLocation::Path(path) => read_path(path).await,
            ModelLocation::S3 { bucket, key } => self.read_s3(bucket, key).await,
        }
    }

    #[cfg(feature = "s3")]
    async fn read_s3(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        use object_store::aws::AmazonS3Builder;
        use object_store::path::Path as ObjectPath;
        use object_store::ObjectStore;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &self.s3.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.s3.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        tracing::debug!(bucket, key, "Fetching model from S3");
        let bytes = store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "s3"))]
    async fn read_s3(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported(format!(
            "s3a://{bucket}/{key} (built without the s3 feature)"
        )))
    }
}

async fn read_path(path: &std::path::Path) -> Result<Vec<u8>, StorageError> {
    let io_error = |path: &std::path::Path, e: std::io::Error| StorageError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_error(path, e))?;
    let file = if metadata.is_dir() {
        path.join(MODEL_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    tracing::debug!(path = %file.display(), "Reading model from filesystem");
    tokio::fs::read(&file).await.map_err(|e| io_error(&file, e))
}

/// Blocking model store for use in synchronous contexts.
pub struct BlockingModelStore {
    inner: ModelStore,
    runtime: tokio::runtime::Runtime,
}

impl BlockingModelStore {
    /// Create a new blocking model store.
    pub fn new(s3: S3Settings) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Runtime(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: ModelStore::new(s3),
            runtime,
        })
    }

    /// Fetch the raw model document.
    pub fn fetch(&self, location: &ModelLocation) -> Result<Vec<u8>, StorageError> {
        self.runtime.block_on(self.inner.fetch(location))
    }
}
