//! Raw tracks document → deduplicated artists, albums and tracks.

pub mod dates;
pub mod first_wins;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, SharedSink, Stage};
use crate::domain::{Album, Artist, NormalizedBatch, Track};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::object_key::extract_ingestion_date;
use crate::pipeline::processing::quality_gate::{record_id, SourceValidator};

use dates::normalize_date_value;
use first_wins::FirstWinsIndex;

/// Turns one raw tracks document into staging records.
///
/// Artists and albums are keyed by id with first-occurrence-wins semantics.
/// Tracks are not deduplicated: a track id repeated within one document
/// yields one row per occurrence and the staging upsert collapses them.
pub struct RecordNormalizer {
    validator: SourceValidator,
    sink: SharedSink,
}

impl RecordNormalizer {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            validator: SourceValidator::new(sink.clone()),
            sink,
        }
    }

    /// Validate, derive the ingestion date from `object_key`, then transform.
    /// Either step failing fails the whole call with no partial output.
    pub fn normalize(&self, document: &Value, object_key: &str) -> Result<NormalizedBatch> {
        if !self.validator.validate(document, object_key) {
            return Err(PipelineError::Validation {
                object_key: object_key.to_string(),
            });
        }

        let created_at = extract_ingestion_date(object_key, self.sink.as_ref())?;
        let batch = self.transform(document, object_key, created_at);

        metrics::normalize::records_emitted("artists", batch.artists.len());
        metrics::normalize::records_emitted("albums", batch.albums.len());
        metrics::normalize::records_emitted("tracks", batch.tracks.len());
        self.sink.emit(
            Diagnostic::info(
                Stage::Normalize,
                format!(
                    "Transformed {} artists, {} albums and {} tracks",
                    batch.artists.len(),
                    batch.albums.len(),
                    batch.tracks.len()
                ),
            )
            .with_source(object_key),
        );

        Ok(batch)
    }

    /// Transform without validating. Tolerates partial tracks: a track with
    /// no id is skipped entirely, a missing album or artist becomes null
    /// references on the track row.
    pub fn transform(&self, document: &Value, object_key: &str, created_at: NaiveDate) -> NormalizedBatch {
        let mut artists: FirstWinsIndex<String, Artist> = FirstWinsIndex::new();
        let mut albums: FirstWinsIndex<String, Album> = FirstWinsIndex::new();
        let mut tracks: Vec<Track> = Vec::new();

        let raw_tracks = document
            .get("tracks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let empty = Map::new();

        for (index, raw) in raw_tracks.iter().enumerate() {
            let Some(track_id) = record_id(raw.get("id")) else {
                metrics::normalize::track_skipped();
                self.sink.emit(
                    Diagnostic::warning(Stage::Normalize, "Skipping track without id")
                        .with_source(object_key)
                        .with_track_index(index)
                        .with_fields(["id"]),
                );
                continue;
            };

            let album = raw.get("album").and_then(Value::as_object).unwrap_or(&empty);
            let album_id = record_id(album.get("id"));

            // Main artist is the first one credited on the album
            let main_artist = album
                .get("artists")
                .and_then(Value::as_array)
                .and_then(|a| a.first());
            let artist_id = main_artist.and_then(|a| record_id(a.get("id")));
            let artist_name = main_artist.and_then(|a| text(a.get("name")));

            if let Some(id) = &artist_id {
                artists.insert_with(id.clone(), || Artist {
                    artist_id: id.clone(),
                    name: artist_name.clone(),
                    created_at,
                });
            }

            if let Some(id) = &album_id {
                if !albums.contains(id) {
                    let release_date = normalize_date_value(album.get("release_date"), self.sink.as_ref());
                    albums.insert_with(id.clone(), || Album {
                        album_id: id.clone(),
                        main_artist_id: artist_id.clone(),
                        name: text(album.get("name")),
                        release_date,
                        release_date_precision: text(album.get("release_date_precision")),
                        total_tracks: integer(album.get("total_tracks")),
                        album_type: text(album.get("album_type")),
                        created_at,
                    });
                }
            }

            tracks.push(Track {
                track_id,
                name: text(raw.get("name")),
                artist_id,
                album_id,
                popularity: integer(raw.get("popularity")),
                duration_ms: integer(raw.get("duration_ms")),
                track_number: integer(raw.get("track_number")),
                disc_number: integer(raw.get("disc_number")),
                is_local: raw.get("is_local").and_then(Value::as_bool).unwrap_or(false),
                created_at,
            });
        }

        NormalizedBatch {
            artists: artists.into_values(),
            albums: albums.into_values(),
            tracks,
        }
    }
}

/// Non-empty JSON string.
fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integral JSON number.
fn integer(value: Option<&Value>) -> Option<i64> {
    value.and_then(Value::as_i64)
}
