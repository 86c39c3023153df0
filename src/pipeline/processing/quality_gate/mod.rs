//! Structural gate in front of the normalizer.
//!
//! A raw tracks document either passes as a whole or is rejected as a whole;
//! the first violation short-circuits and is reported with the track index
//! and offending fields so the batch can be diagnosed without re-running.

use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, SharedSink, Stage};
use crate::observability::metrics;

pub const REQUIRED_TRACK_FIELDS: &[&str] = &["id", "name", "album"];
pub const REQUIRED_ALBUM_FIELDS: &[&str] = &["id", "name", "release_date", "album_type", "artists"];
pub const REQUIRED_ARTIST_FIELDS: &[&str] = &["id", "name"];

/// First structural problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotAMapping,
    MissingTracks,
    TrackNotAMapping { index: usize },
    TrackFieldsMissing { index: usize, fields: Vec<String> },
    AlbumNotAMapping { index: usize },
    AlbumFieldsMissing { index: usize, fields: Vec<String> },
    MainArtistMissing { index: usize, fields: Vec<String> },
}

impl Violation {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Violation::NotAMapping => "not_a_mapping",
            Violation::MissingTracks => "missing_tracks",
            Violation::TrackNotAMapping { .. } => "track_not_a_mapping",
            Violation::TrackFieldsMissing { .. } => "track_fields_missing",
            Violation::AlbumNotAMapping { .. } => "album_not_a_mapping",
            Violation::AlbumFieldsMissing { .. } => "album_fields_missing",
            Violation::MainArtistMissing { .. } => "main_artist_missing",
        }
    }

    fn into_diagnostic(self, object_key: &str, document: &Value) -> Diagnostic {
        let d = match self {
            Violation::NotAMapping => Diagnostic::warning(
                Stage::Validate,
                format!(
                    "Invalid data type for object '{}': expected mapping, got {}",
                    object_key,
                    json_type(document)
                ),
            ),
            Violation::MissingTracks => Diagnostic::warning(
                Stage::Validate,
                format!("No tracks list found in object '{}' or tracks is empty", object_key),
            )
            .with_fields(["tracks"]),
            Violation::TrackNotAMapping { index } => Diagnostic::warning(
                Stage::Validate,
                format!("Track {} in '{}' is not a mapping", index, object_key),
            )
            .with_track_index(index),
            Violation::TrackFieldsMissing { index, fields } => Diagnostic::warning(
                Stage::Validate,
                format!(
                    "Track {} in '{}' missing required fields: {:?}",
                    index, object_key, fields
                ),
            )
            .with_track_index(index)
            .with_fields(fields),
            Violation::AlbumNotAMapping { index } => Diagnostic::warning(
                Stage::Validate,
                format!("Track {} album in '{}' is not a mapping", index, object_key),
            )
            .with_track_index(index)
            .with_fields(["album"]),
            Violation::AlbumFieldsMissing { index, fields } => Diagnostic::warning(
                Stage::Validate,
                format!(
                    "Track {} album in '{}' missing fields: {:?}",
                    index, object_key, fields
                ),
            )
            .with_track_index(index)
            .with_fields(fields.into_iter().map(|f| format!("album.{}", f))),
            Violation::MainArtistMissing { index, fields } => Diagnostic::warning(
                Stage::Validate,
                format!(
                    "Track {} album main artist missing in '{}': {:?}",
                    index, object_key, fields
                ),
            )
            .with_track_index(index)
            .with_fields(fields.into_iter().map(|f| format!("album.artists[0].{}", f))),
        };
        d.with_source(object_key)
    }
}

/// Validates raw tracks documents before transformation.
pub struct SourceValidator {
    sink: SharedSink,
}

impl SourceValidator {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }

    /// `true` only when the whole document is structurally sound. Never fails;
    /// violations are reported through the diagnostics sink.
    pub fn validate(&self, document: &Value, object_key: &str) -> bool {
        match check_document(document) {
            Ok(()) => {
                metrics::validate::document_accepted();
                self.sink.emit(
                    Diagnostic::info(
                        Stage::Validate,
                        format!("All tracks in '{}' passed validation", object_key),
                    )
                    .with_source(object_key),
                );
                true
            }
            Err(violation) => {
                metrics::validate::document_rejected(violation.reason());
                self.sink.emit(violation.into_diagnostic(object_key, document));
                false
            }
        }
    }
}

/// Structural check without side effects.
pub fn check_document(document: &Value) -> Result<(), Violation> {
    let root = document.as_object().ok_or(Violation::NotAMapping)?;

    let tracks = match root.get("tracks") {
        Some(Value::Array(tracks)) if !tracks.is_empty() => tracks,
        _ => return Err(Violation::MissingTracks),
    };

    for (index, track) in tracks.iter().enumerate() {
        let track = track
            .as_object()
            .ok_or(Violation::TrackNotAMapping { index })?;

        let fields = missing_fields(track, REQUIRED_TRACK_FIELDS);
        if !fields.is_empty() {
            return Err(Violation::TrackFieldsMissing { index, fields });
        }

        let album = track
            .get("album")
            .and_then(Value::as_object)
            .ok_or(Violation::AlbumNotAMapping { index })?;

        let fields = missing_fields(album, REQUIRED_ALBUM_FIELDS);
        if !fields.is_empty() {
            return Err(Violation::AlbumFieldsMissing { index, fields });
        }

        let main_artist = album
            .get("artists")
            .and_then(Value::as_array)
            .and_then(|artists| artists.first())
            .and_then(Value::as_object);

        match main_artist {
            Some(artist) => {
                let fields = missing_fields(artist, REQUIRED_ARTIST_FIELDS);
                if !fields.is_empty() {
                    return Err(Violation::MainArtistMissing { index, fields });
                }
            }
            None => {
                return Err(Violation::MainArtistMissing {
                    index,
                    fields: REQUIRED_ARTIST_FIELDS.iter().map(|f| f.to_string()).collect(),
                })
            }
        }
    }

    Ok(())
}

/// A value counts as present unless it is null, false, or an empty
/// string, array or mapping.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

/// Record id as text: a non-empty string, or an integer written in decimal.
/// The normalizer keys records with exactly this, so every id the validator
/// accepts yields a row.
pub fn record_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn missing_fields(map: &Map<String, Value>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| match **field {
            "id" => record_id(map.get("id")).is_none(),
            other => !is_present(map.get(other)),
        })
        .map(|field| field.to_string())
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, Severity};
    use serde_json::json;
    use std::sync::Arc;

    const KEY: &str = "spotify_data/tracks/tracks_2026-02-07.json";

    fn track(id: &str, album_id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Track {}", id),
            "album": {
                "id": album_id,
                "name": "Album",
                "release_date": "2020-01-01",
                "album_type": "album",
                "artists": [{"id": "ar1", "name": "Artist"}]
            }
        })
    }

    fn validator() -> (SourceValidator, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (SourceValidator::new(sink.clone()), sink)
    }

    #[test]
    fn accepts_well_formed_document() {
        let (validator, sink) = validator();
        let doc = json!({"tracks": [track("t1", "al1"), track("t2", "al1")]});
        assert!(validator.validate(&doc, KEY));
        assert_eq!(sink.count(Severity::Warning), 0);
        assert_eq!(sink.count(Severity::Info), 1);
    }

    #[test]
    fn rejects_non_mapping_document() {
        let (validator, sink) = validator();
        assert!(!validator.validate(&json!([track("t1", "al1")]), KEY));
        assert!(sink.diagnostics()[0].message.contains("got array"));
    }

    #[test]
    fn rejects_missing_or_empty_tracks() {
        assert_eq!(check_document(&json!({})), Err(Violation::MissingTracks));
        assert_eq!(check_document(&json!({"tracks": []})), Err(Violation::MissingTracks));
        assert_eq!(check_document(&json!({"tracks": {"a": 1}})), Err(Violation::MissingTracks));
    }

    #[test]
    fn rejects_track_that_is_not_a_mapping() {
        let doc = json!({"tracks": [track("t1", "al1"), "t2"]});
        assert_eq!(check_document(&doc), Err(Violation::TrackNotAMapping { index: 1 }));
    }

    #[test]
    fn reports_all_missing_track_fields() {
        let doc = json!({"tracks": [{"id": "", "album": null}]});
        assert_eq!(
            check_document(&doc),
            Err(Violation::TrackFieldsMissing {
                index: 0,
                fields: vec!["id".into(), "name".into(), "album".into()],
            })
        );
    }

    #[test]
    fn rejects_album_that_is_not_a_mapping() {
        let doc = json!({"tracks": [{"id": "t1", "name": "n", "album": "al1"}]});
        assert_eq!(check_document(&doc), Err(Violation::AlbumNotAMapping { index: 0 }));
    }

    #[test]
    fn second_track_album_missing_release_date() {
        let (validator, sink) = validator();
        let mut second = track("t2", "al2");
        second["album"].as_object_mut().unwrap().remove("release_date");
        let doc = json!({"tracks": [track("t1", "al1"), second]});

        assert!(!validator.validate(&doc, KEY));

        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.track_index, Some(1));
        assert_eq!(d.fields, vec!["album.release_date".to_string()]);
        assert_eq!(d.source.as_deref(), Some(KEY));
    }

    #[test]
    fn rejects_empty_artists_and_incomplete_main_artist() {
        let mut no_artists = track("t1", "al1");
        no_artists["album"]["artists"] = json!([]);
        assert_eq!(
            check_document(&json!({"tracks": [no_artists]})),
            Err(Violation::AlbumFieldsMissing { index: 0, fields: vec!["artists".into()] })
        );

        let mut nameless = track("t1", "al1");
        nameless["album"]["artists"] = json!([{"id": "ar1", "name": ""}, {"id": "ar2", "name": "B"}]);
        assert_eq!(
            check_document(&json!({"tracks": [nameless]})),
            Err(Violation::MainArtistMissing { index: 0, fields: vec!["name".into()] })
        );

        let mut scalar_artist = track("t1", "al1");
        scalar_artist["album"]["artists"] = json!(["ar1"]);
        assert!(matches!(
            check_document(&json!({"tracks": [scalar_artist]})),
            Err(Violation::MainArtistMissing { index: 0, .. })
        ));
    }

    #[test]
    fn first_violation_short_circuits() {
        let (validator, sink) = validator();
        let doc = json!({"tracks": [{"name": "no id"}, {"id": "t2"}]});
        assert!(!validator.validate(&doc, KEY));
        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].track_index, Some(0));
    }

    #[test]
    fn presence_rules() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&Value::Null)));
        assert!(!is_present(Some(&json!(""))));
        assert!(!is_present(Some(&json!(false))));
        assert!(!is_present(Some(&json!({}))));
        assert!(is_present(Some(&json!(0))));
        assert!(is_present(Some(&json!("x"))));
    }

    #[test]
    fn integer_ids_are_accepted() {
        let mut doc = json!({"tracks": [track("t1", "al1")]});
        doc["tracks"][0]["id"] = json!(12345);
        doc["tracks"][0]["album"]["id"] = json!(777);
        doc["tracks"][0]["album"]["artists"][0]["id"] = json!(42);
        assert_eq!(check_document(&doc), Ok(()));
    }

    #[test]
    fn ids_that_cannot_key_a_row_are_rejected() {
        for bad in [json!(true), json!(1.5), json!(["t1"]), json!({"v": 1})] {
            let mut doc = json!({"tracks": [track("t1", "al1")]});
            doc["tracks"][0]["id"] = bad.clone();
            assert_eq!(
                check_document(&doc),
                Err(Violation::TrackFieldsMissing {
                    index: 0,
                    fields: vec!["id".to_string()]
                }),
                "{}",
                bad
            );
        }

        let mut doc = json!({"tracks": [track("t1", "al1")]});
        doc["tracks"][0]["album"]["artists"][0]["id"] = json!(false);
        assert!(matches!(
            check_document(&doc),
            Err(Violation::MainArtistMissing { index: 0, .. })
        ));
    }

    #[test]
    fn record_id_text() {
        assert_eq!(record_id(Some(&json!("abc"))), Some("abc".to_string()));
        assert_eq!(record_id(Some(&json!(12345))), Some("12345".to_string()));
        assert_eq!(record_id(Some(&json!(""))), None);
        assert_eq!(record_id(Some(&json!(0.5))), None);
        assert_eq!(record_id(None), None);
    }
}
