//! Partial release dates ("2026-02-07", "2026-02", "2026") to calendar dates.
//!
//! Unparsable values degrade to `None` with a warning; they never fail the
//! document. Compare with `pipeline::ingestion::object_key`, where a bad date
//! is fatal.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Stage};
use crate::observability::metrics;

static FULL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

/// Why a release date string could not become a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    /// Empty input, or a length that matches no supported precision
    Unsupported,
    /// Right length, wrong shape or impossible calendar date
    Invalid(String),
}

/// Parse a release date by its length: 10 → `YYYY-MM-DD`, 7 → `YYYY-MM`
/// (day 1), 4 → `YYYY` (January 1st). Year 0 is not a calendar year.
pub fn parse_partial_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let date = match raw.len() {
        10 => {
            if !FULL_DATE.is_match(raw) {
                return Err(DateParseError::Invalid(format!("'{}' does not match YYYY-MM-DD", raw)));
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| DateParseError::Invalid(format!("'{}': {}", raw, e)))
        }
        7 => {
            if !YEAR_MONTH.is_match(raw) {
                return Err(DateParseError::Invalid(format!("'{}' does not match YYYY-MM", raw)));
            }
            NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
                .map_err(|e| DateParseError::Invalid(format!("'{}': {}", raw, e)))
        }
        4 => {
            if !YEAR.is_match(raw) {
                return Err(DateParseError::Invalid(format!("'{}' does not match YYYY", raw)));
            }
            raw.parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
                .ok_or_else(|| DateParseError::Invalid(format!("'{}' is not a valid year", raw)))
        }
        _ => Err(DateParseError::Unsupported),
    }?;
    if date.year() < 1 {
        return Err(DateParseError::Invalid(format!("'{}': year must be at least 1", raw)));
    }
    Ok(date)
}

/// Lenient release date normalization. Returns `None` for empty input,
/// unsupported lengths, and strings that fail their expected pattern; only
/// the last case is reported, as a warning.
pub fn normalize_date(raw: &str, sink: &dyn DiagnosticSink) -> Option<NaiveDate> {
    match parse_partial_date(raw) {
        Ok(date) => Some(date),
        Err(DateParseError::Unsupported) => None,
        Err(DateParseError::Invalid(reason)) => {
            metrics::normalize::release_date_parse_warning();
            sink.emit(
                Diagnostic::warning(Stage::Normalize, format!("Error parsing release_date: {}", reason))
                    .with_fields(["release_date"]),
            );
            None
        }
    }
}

/// Normalize a raw JSON `release_date`. Numbers are read through their
/// decimal text so a bare year such as `1999` still resolves.
pub fn normalize_date_value(value: Option<&Value>, sink: &dyn DiagnosticSink) -> Option<NaiveDate> {
    match value? {
        Value::String(s) => normalize_date(s, sink),
        Value::Number(n) => normalize_date(&n.to_string(), sink),
        _ => None,
    }
}
