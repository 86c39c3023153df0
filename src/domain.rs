//! Normalized staging records.
//!
//! Raw documents are handled as `serde_json::Value` all the way through
//! validation and normalization; only these three shapes leave the
//! normalizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of `stg_artists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    pub name: Option<String>,
    pub created_at: NaiveDate,
}

/// One row of `stg_albums`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub album_id: String,
    /// First artist credited on the album, when one was present
    pub main_artist_id: Option<String>,
    pub name: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub release_date_precision: Option<String>,
    pub total_tracks: Option<i64>,
    pub album_type: Option<String>,
    pub created_at: NaiveDate,
}

/// One row of `stg_tracks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub name: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub popularity: Option<i64>,
    pub duration_ms: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub is_local: bool,
    pub created_at: NaiveDate,
}

/// Output of one normalizer invocation, each collection in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedBatch {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
}

impl NormalizedBatch {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty() && self.albums.is_empty() && self.tracks.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Artist>, Vec<Album>, Vec<Track>) {
        (self.artists, self.albums, self.tracks)
    }
}
