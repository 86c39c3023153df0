// Pipeline ingestion: seed ids and object key naming

pub mod object_key;
pub mod seed;

pub use object_key::{build_object_key, extract_ingestion_date, file_name};
pub use seed::read_track_ids;
