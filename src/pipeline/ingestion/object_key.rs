//! Object key naming: `<folder>/<category>/<category>_<YYYY-MM-DD>.json`.
//!
//! The date suffix is the ingestion date of every record staged from the
//! object, so a key that does not carry one is a hard failure.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{OBJECT_KEY_DATE_FORMAT, OBJECT_KEY_SUFFIX};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Stage};
use crate::error::{PipelineError, Result};

static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Build the key an ingestion run uploads its document under.
pub fn build_object_key(folder: &str, category: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/{}_{}{}",
        folder.trim_matches('/'),
        category,
        category,
        date.format(OBJECT_KEY_DATE_FORMAT),
        OBJECT_KEY_SUFFIX
    )
}

/// Last path segment of an object key.
pub fn file_name(object_key: &str) -> &str {
    object_key.rsplit('/').next().unwrap_or(object_key)
}

/// Ingestion date encoded in an object key. Errors are reported to `sink`
/// and returned; there is no fallback date.
pub fn extract_ingestion_date(object_key: &str, sink: &dyn DiagnosticSink) -> Result<NaiveDate> {
    parse_ingestion_date(object_key).map_err(|e| {
        sink.emit(
            Diagnostic::error(
                Stage::Normalize,
                format!("Failed to extract date from object key '{}': {}", object_key, e),
            )
            .with_source(object_key),
        );
        e
    })
}

fn parse_ingestion_date(object_key: &str) -> Result<NaiveDate> {
    let name = file_name(object_key);

    if !name.contains('_') || !name.ends_with(OBJECT_KEY_SUFFIX) {
        return Err(PipelineError::format(
            object_key,
            format!("file name '{}' is not in the expected <category>_<YYYY-MM-DD>.json format", name),
        ));
    }

    let stem = &name[..name.len() - OBJECT_KEY_SUFFIX.len()];
    let token = stem.rsplit('_').next().unwrap_or(stem);

    if !DATE_TOKEN.is_match(token) {
        return Err(PipelineError::format(
            object_key,
            format!("date token '{}' does not match YYYY-MM-DD", token),
        ));
    }

    NaiveDate::parse_from_str(token, OBJECT_KEY_DATE_FORMAT)
        .map_err(|e| PipelineError::format(object_key, format!("date token '{}': {}", token, e)))
}
