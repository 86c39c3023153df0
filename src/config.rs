use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::app::stage_use_case::InvalidDocumentPolicy;
use crate::constants::{
    DEFAULT_BUCKET, DEFAULT_CATALOG_BASE_URL, DEFAULT_CATALOG_TIMEOUT_SECS, DEFAULT_FOLDER,
    DEFAULT_OBJECT_STORE_ROOT, DEFAULT_STAGING_DB, DEFAULT_TOKEN_ENV, DEFAULT_TRACK_IDS_FILE,
    TRACKS_CATEGORY,
};
use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub object_store: ObjectStoreConfig,
    pub staging: StagingConfig,
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub track_ids_file: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            track_ids_file: DEFAULT_TRACK_IDS_FILE.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_CATALOG_TIMEOUT_SECS,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)?;
        if token.trim().is_empty() {
            return Err(PipelineError::Config(format!("{} is set but empty", self.token_env)));
        }
        Ok(token)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub root: String,
    pub bucket: String,
    pub folder: String,
    pub category: String,
    /// Pretty-print uploaded documents
    pub pretty: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_OBJECT_STORE_ROOT.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            folder: DEFAULT_FOLDER.to_string(),
            category: TRACKS_CATEGORY.to_string(),
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub database_path: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_STAGING_DB.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub on_invalid_document: InvalidDocumentPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub pushgateway_url: Option<String>,
    pub instance: Option<String>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` when given (it must exist), else `config.toml` if present,
    /// else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }
}
