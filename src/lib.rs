pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;

// Application layer and its adapters
pub mod app;
pub mod infra;

pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, SharedSink, TracingSink};
pub use domain::{Album, Artist, NormalizedBatch, Track};
pub use error::{PipelineError, Result};
pub use pipeline::ingestion::extract_ingestion_date;
pub use pipeline::processing::normalize::dates::normalize_date;
pub use pipeline::processing::{RecordNormalizer, SourceValidator};
pub use pipeline::storage::StagingLoader;
