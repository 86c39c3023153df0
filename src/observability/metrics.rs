//! Metrics for the staging pipeline, using Prometheus naming conventions.
//!
//! Recording helpers are plain `metrics` facade calls, so they are no-ops
//! until [`init`] installs a recorder (tests never do).

use once_cell::sync::OnceCell;
use std::fmt;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Every metric name used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingest
    CatalogRequestsSuccess,
    CatalogRequestsError,
    CatalogRequestDuration,
    ObjectsUploaded,
    ObjectBytesUploaded,

    // Validate
    DocumentsAccepted,
    DocumentsRejected,

    // Normalize
    RecordsEmitted,
    ReleaseDateParseWarnings,
    TracksSkipped,

    // Load
    RowsUpserted,
    UpsertErrors,
    UpsertDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CatalogRequestsSuccess => "spotify_staging_catalog_requests_success_total",
            MetricName::CatalogRequestsError => "spotify_staging_catalog_requests_error_total",
            MetricName::CatalogRequestDuration => "spotify_staging_catalog_request_duration_seconds",
            MetricName::ObjectsUploaded => "spotify_staging_objects_uploaded_total",
            MetricName::ObjectBytesUploaded => "spotify_staging_object_bytes_uploaded",
            MetricName::DocumentsAccepted => "spotify_staging_documents_accepted_total",
            MetricName::DocumentsRejected => "spotify_staging_documents_rejected_total",
            MetricName::RecordsEmitted => "spotify_staging_records_emitted_total",
            MetricName::ReleaseDateParseWarnings => "spotify_staging_release_date_parse_warnings_total",
            MetricName::TracksSkipped => "spotify_staging_tracks_skipped_total",
            MetricName::RowsUpserted => "spotify_staging_rows_upserted_total",
            MetricName::UpsertErrors => "spotify_staging_upsert_errors_total",
            MetricName::UpsertDuration => "spotify_staging_upsert_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            CatalogRequestsSuccess,
            CatalogRequestsError,
            CatalogRequestDuration,
            ObjectsUploaded,
            ObjectBytesUploaded,
            DocumentsAccepted,
            DocumentsRejected,
            RecordsEmitted,
            ReleaseDateParseWarnings,
            TracksSkipped,
            RowsUpserted,
            UpsertErrors,
            UpsertDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceCell<metrics_exporter_prometheus::PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Calling it more than once is harmless.
pub fn init() -> Result<()> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| {
                PipelineError::Config(format!("Failed to install Prometheus recorder: {}", e))
            })?;
        info!("Metrics recorder installed");
        Ok::<_, PipelineError>(handle)
    })?;
    Ok(())
}

/// Current exposition text, if a recorder was installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Push everything recorded so far to a Prometheus Pushgateway.
pub async fn push(pushgateway_url: &str, instance: &str) -> Result<()> {
    let Some(metrics_text) = render() else {
        return Ok(());
    };

    let push_url = format!(
        "{}/metrics/job/spotify_staging/instance/{}",
        pushgateway_url.trim_end_matches('/'),
        instance
    );

    let response = reqwest::Client::new()
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(metrics_text)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::Api {
            message: format!("Pushgateway returned status {}: {}", status, body),
        });
    }

    info!("Pushed metrics to Pushgateway for instance={}", instance);
    Ok(())
}

// ============================================================================
// Ingest Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn request_success() {
        ::metrics::counter!(MetricName::CatalogRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_error(error_type: &str) {
        ::metrics::counter!(
            MetricName::CatalogRequestsError.as_str(),
            "error_type" => error_type.to_string()
        )
        .increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::CatalogRequestDuration.as_str()).record(secs);
    }

    pub fn object_uploaded(bytes: usize) {
        ::metrics::counter!(MetricName::ObjectsUploaded.as_str()).increment(1);
        ::metrics::histogram!(MetricName::ObjectBytesUploaded.as_str()).record(bytes as f64);
    }
}

// ============================================================================
// Validate Metrics
// ============================================================================

pub mod validate {
    use super::MetricName;

    pub fn document_accepted() {
        ::metrics::counter!(MetricName::DocumentsAccepted.as_str()).increment(1);
    }

    pub fn document_rejected(reason: &'static str) {
        ::metrics::counter!(MetricName::DocumentsRejected.as_str(), "reason" => reason).increment(1);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn records_emitted(kind: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RecordsEmitted.as_str(), "kind" => kind).increment(count as u64);
    }

    pub fn release_date_parse_warning() {
        ::metrics::counter!(MetricName::ReleaseDateParseWarnings.as_str()).increment(1);
    }

    pub fn track_skipped() {
        ::metrics::counter!(MetricName::TracksSkipped.as_str()).increment(1);
    }
}

// ============================================================================
// Load Metrics
// ============================================================================

pub mod load {
    use super::MetricName;

    pub fn rows_upserted(table: &str, count: usize) {
        ::metrics::counter!(MetricName::RowsUpserted.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }

    pub fn upsert_error(table: &str) {
        ::metrics::counter!(MetricName::UpsertErrors.as_str(), "table" => table.to_string()).increment(1);
    }

    pub fn upsert_duration(table: &str, secs: f64) {
        ::metrics::histogram!(MetricName::UpsertDuration.as_str(), "table" => table.to_string())
            .record(secs);
    }
}
