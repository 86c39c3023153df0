use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

// Ingest-side ports
#[async_trait]
pub trait CatalogApiPort: Send + Sync {
    /// Fetch the catalog document for `ids`; the response body is returned as-is.
    async fn fetch_tracks(&self, ids: &[String], token: &str) -> Result<Value>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Hex sha256 of the object bytes
    pub sha256: String,
}

#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Store `bytes` under `key`, creating the bucket first if it is absent.
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<ObjectMeta>;
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
    /// Every object in the bucket, ordered by key. A missing bucket lists empty.
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectMeta>>;
}
