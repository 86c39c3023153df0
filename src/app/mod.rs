pub mod ports;
pub mod ingest_use_case;
pub mod stage_use_case;
