use serde::Deserialize;
use std::path::Path;

use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(alias = "spotify_ids")]
    sportify_ids: SeedIds,
}

#[derive(Debug, Deserialize)]
struct SeedIds {
    #[serde(default)]
    tracker_ids: Vec<String>,
}

/// Read the track ids to ingest from the seed file
/// (`{"sportify_ids": {"tracker_ids": [...]}}`).
pub fn read_track_ids(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("cannot read track ids file {}: {}", path.display(), e))
    })?;
    let seed: SeedFile = serde_json::from_str(&raw)?;
    Ok(seed
        .sportify_ids
        .tracker_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn seed(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_tracker_ids() {
        let file = seed(r#"{"sportify_ids": {"artist_ids": ["x"], "tracker_ids": ["t1", " t2 ", ""]}}"#);
        assert_eq!(read_track_ids(file.path()).unwrap(), vec!["t1", "t2"]);
    }

    #[test]
    fn accepts_corrected_section_name() {
        let file = seed(r#"{"spotify_ids": {"tracker_ids": ["t1"]}}"#);
        assert_eq!(read_track_ids(file.path()).unwrap(), vec!["t1"]);
    }

    #[test]
    fn missing_section_is_an_error() {
        let file = seed(r#"{"ids": []}"#);
        assert!(matches!(read_track_ids(file.path()), Err(PipelineError::Json(_))));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = read_track_ids("/nonexistent/spotify_ids.json").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
