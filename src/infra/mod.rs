pub mod fs_object_store;
pub mod http_client;

pub use fs_object_store::FsObjectStore;
pub use http_client::SpotifyCatalogClient;
