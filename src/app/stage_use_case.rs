use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::app::ports::ObjectStorePort;
use crate::diagnostics::{Diagnostic, SharedSink, Stage};
use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::file_name;
use crate::pipeline::processing::RecordNormalizer;
use crate::pipeline::storage::{LoadSummary, StagingLoader};

/// What to do with a document that is not valid JSON or fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidDocumentPolicy {
    /// Record the rejection and continue with the next object
    #[default]
    Skip,
    /// Abort the run
    Fail,
}

#[derive(Debug, Clone)]
pub struct StageSettings {
    pub bucket: String,
    pub category: String,
    pub on_invalid_document: InvalidDocumentPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub object_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub documents_seen: usize,
    pub documents_loaded: usize,
    pub skipped: Vec<SkippedDocument>,
    pub rows: LoadSummary,
}

/// Reads every stored document of the configured category, normalizes it
/// and upserts the result into the staging tables.
pub struct StageUseCase {
    store: Arc<dyn ObjectStorePort>,
    normalizer: RecordNormalizer,
    loader: StagingLoader,
    settings: StageSettings,
    sink: SharedSink,
}

impl StageUseCase {
    pub fn new(
        store: Arc<dyn ObjectStorePort>,
        loader: StagingLoader,
        settings: StageSettings,
        sink: SharedSink,
    ) -> Self {
        Self {
            store,
            normalizer: RecordNormalizer::new(sink.clone()),
            loader,
            settings,
            sink,
        }
    }

    pub async fn run(&self) -> Result<StageReport> {
        self.loader.ensure_schema()?;

        let mut report = StageReport::default();
        let objects = self.store.list(&self.settings.bucket).await?;
        for object in objects
            .iter()
            .filter(|o| file_name(&o.key).contains(self.settings.category.as_str()))
        {
            report.documents_seen += 1;
            let key = object.key.as_str();
            let bytes = self.store.get(&self.settings.bucket, key).await?;

            if bytes.iter().all(u8::is_ascii_whitespace) {
                self.sink.emit(
                    Diagnostic::warning(Stage::Ingest, format!("The file {} is empty.", key)).with_source(key),
                );
                report.skipped.push(SkippedDocument {
                    object_key: key.to_string(),
                    reason: "empty".to_string(),
                });
                continue;
            }

            let batch = match serde_json::from_slice::<Value>(&bytes)
                .map_err(PipelineError::from)
                .and_then(|document| self.normalizer.normalize(&document, key))
            {
                Ok(batch) => batch,
                Err(e @ (PipelineError::Json(_) | PipelineError::Validation { .. })) => {
                    self.reject(key, e, &mut report)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let summary = self.loader.load_batch(&batch)?;
            report.rows.add(summary);
            report.documents_loaded += 1;
        }

        self.sink.emit(Diagnostic::info(
            Stage::Load,
            format!(
                "Staged {} of {} documents ({} artists, {} albums, {} tracks)",
                report.documents_loaded,
                report.documents_seen,
                report.rows.artists,
                report.rows.albums,
                report.rows.tracks
            ),
        ));
        Ok(report)
    }

    fn reject(&self, key: &str, error: PipelineError, report: &mut StageReport) -> Result<()> {
        match self.settings.on_invalid_document {
            InvalidDocumentPolicy::Fail => Err(error),
            InvalidDocumentPolicy::Skip => {
                self.sink.emit(
                    Diagnostic::warning(Stage::Validate, format!("Skipping invalid document: {}", error))
                        .with_source(key),
                );
                report.skipped.push(SkippedDocument {
                    object_key: key.to_string(),
                    reason: error.kind().to_string(),
                });
                Ok(())
            }
        }
    }
}
