pub mod schema;
pub mod staging;

pub use schema::{TableSchema, ALBUMS_TABLE, ARTISTS_TABLE, STAGING_TABLES, TRACKS_TABLE};
pub use staging::{ConnectionProvider, LoadSummary, SqliteConnector, StagingLoader, StagingRecord};
