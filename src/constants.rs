/// Naming constants shared by ingestion, staging and the CLI.

// Object store layout: <folder>/<category>/<category>_<YYYY-MM-DD>.json
pub const DEFAULT_BUCKET: &str = "row-data";
pub const DEFAULT_FOLDER: &str = "spotify_data";
pub const TRACKS_CATEGORY: &str = "tracks";
pub const OBJECT_KEY_SUFFIX: &str = ".json";
pub const OBJECT_KEY_DATE_FORMAT: &str = "%Y-%m-%d";

// Catalog API
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TOKEN_ENV: &str = "SPOTIFY_TOKEN";
pub const DEFAULT_TRACK_IDS_FILE: &str = "include/spotify_ids.json";
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;

// Staging tables and their primary keys
pub const STG_ARTISTS: &str = "stg_artists";
pub const STG_ALBUMS: &str = "stg_albums";
pub const STG_TRACKS: &str = "stg_tracks";
pub const ARTIST_PK: &str = "artist_id";
pub const ALBUM_PK: &str = "album_id";
pub const TRACK_PK: &str = "track_id";

pub const DEFAULT_STAGING_DB: &str = "data/staging.db";
pub const DEFAULT_OBJECT_STORE_ROOT: &str = "data/object_store";

/// Rows per bulk INSERT statement; all pages of one call share a transaction.
pub const UPSERT_PAGE_SIZE: usize = 100;
