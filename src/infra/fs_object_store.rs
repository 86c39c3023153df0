use crate::app::ports::{ObjectMeta, ObjectStorePort};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Object store on a local directory tree: `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_relative(bucket)?))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Ok(self.bucket_dir(bucket)?.join(checked_relative(key)?))
    }
}

fn store_error(message: impl Into<String>) -> PipelineError {
    PipelineError::ObjectStore {
        message: message.into(),
    }
}

/// Keys must stay inside the bucket: no absolute paths and no `..`.
fn checked_relative(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    if key.is_empty() {
        return Err(store_error("empty object key"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(store_error(format!("invalid object key '{}'", key))),
        }
    }
    Ok(path)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn meta_for(path: &Path, key: String, bytes: &[u8]) -> ObjectMeta {
    let last_modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    ObjectMeta {
        key,
        size: bytes.len() as u64,
        last_modified,
        sha256: sha256_hex(bytes),
    }
}

fn list_blocking(bucket_dir: PathBuf) -> Result<Vec<ObjectMeta>> {
    if !bucket_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut objects = Vec::new();
    for entry in WalkDir::new(&bucket_dir).follow_links(false) {
        let entry = entry.map_err(|e| store_error(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&bucket_dir)
            .map_err(|e| store_error(e.to_string()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = std::fs::read(entry.path())?;
        objects.push(meta_for(entry.path(), key, &bytes));
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}

#[async_trait]
impl ObjectStorePort for FsObjectStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<ObjectMeta> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !tokio::fs::try_exists(&bucket_dir).await? {
            tokio::fs::create_dir_all(&bucket_dir).await?;
            info!(bucket = bucket, "Bucket created");
        }
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(bucket = bucket, key = key, bytes = bytes.len(), "Object written");
        Ok(meta_for(&path, key.to_string(), &bytes))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(store_error(format!("object '{}/{}' not found", bucket, key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectMeta>> {
        let bucket_dir = self.bucket_dir(bucket)?;
        tokio::task::spawn_blocking(move || list_blocking(bucket_dir))
            .await
            .map_err(|e| store_error(format!("listing task failed: {}", e)))?
    }
}
