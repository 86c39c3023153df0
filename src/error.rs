use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Object key or date token does not follow the storage naming convention.
    #[error("Format error in '{input}': {reason}")]
    Format { input: String, reason: String },

    /// Source document failed structural validation; nothing was transformed.
    #[error("Source document '{object_key}' failed validation")]
    Validation { object_key: String },

    #[error("Failed to persist records into {table}: {source}")]
    Persistence {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Record schema mismatch for {table}: {detail}")]
    SchemaMismatch { table: String, detail: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Object store error: {message}")]
    ObjectStore { message: String },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl PipelineError {
    pub fn format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(table: &str, source: rusqlite::Error) -> Self {
        PipelineError::Persistence {
            table: table.to_string(),
            source,
        }
    }

    /// Short label used for metrics and skip reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format { .. } => "format",
            PipelineError::Validation { .. } => "validation",
            PipelineError::Persistence { .. } => "persistence",
            PipelineError::SchemaMismatch { .. } => "schema_mismatch",
            PipelineError::Http(_) => "http",
            PipelineError::Json(_) => "json",
            PipelineError::Toml(_) => "toml",
            PipelineError::Io(_) => "io",
            PipelineError::Config(_) => "config",
            PipelineError::Api { .. } => "api",
            PipelineError::ObjectStore { .. } => "object_store",
            PipelineError::Env(_) => "env",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
