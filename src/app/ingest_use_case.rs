use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::app::ports::{CatalogApiPort, ObjectStorePort};
use crate::config::ObjectStoreConfig;
use crate::diagnostics::{Diagnostic, SharedSink, Stage};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::build_object_key;

/// Where and how fetched documents are written.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub bucket: String,
    pub folder: String,
    pub category: String,
    pub pretty: bool,
}

impl From<&ObjectStoreConfig> for IngestSettings {
    fn from(config: &ObjectStoreConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            folder: config.folder.clone(),
            category: config.category.clone(),
            pretty: config.pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Uploaded { object_key: String, track_count: usize },
    /// Nothing was uploaded; downstream steps should be skipped, not failed.
    Skipped { reason: String },
}

/// Fetches one catalog document and uploads it under today's object key.
pub struct IngestUseCase {
    catalog: Arc<dyn CatalogApiPort>,
    store: Arc<dyn ObjectStorePort>,
    settings: IngestSettings,
    sink: SharedSink,
}

impl IngestUseCase {
    pub fn new(
        catalog: Arc<dyn CatalogApiPort>,
        store: Arc<dyn ObjectStorePort>,
        settings: IngestSettings,
        sink: SharedSink,
    ) -> Self {
        Self {
            catalog,
            store,
            settings,
            sink,
        }
    }

    pub async fn run(&self, ids: &[String], token: &str, today: NaiveDate) -> Result<IngestOutcome> {
        let document = match self.catalog.fetch_tracks(ids, token).await {
            Ok(document) => document,
            Err(e) => {
                let reason = format!("catalog fetch failed: {}", e);
                self.sink.emit(Diagnostic::error(Stage::Ingest, reason.clone()));
                return Ok(IngestOutcome::Skipped { reason });
            }
        };

        let track_count = document
            .get("tracks")
            .and_then(|t| t.as_array())
            .map(|t| t.len())
            .unwrap_or(0);
        if track_count == 0 {
            let reason = "No tracks data found".to_string();
            self.sink.emit(Diagnostic::warning(Stage::Ingest, reason.clone()));
            return Ok(IngestOutcome::Skipped { reason });
        }

        let bytes = if self.settings.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };
        let object_key = build_object_key(&self.settings.folder, &self.settings.category, today);

        let meta = self.store.put(&self.settings.bucket, &object_key, bytes).await?;
        metrics::ingest::object_uploaded(meta.size as usize);
        self.sink.emit(
            Diagnostic::info(
                Stage::Ingest,
                format!(
                    "Uploaded {} tracks to {}/{} ({} bytes)",
                    track_count, self.settings.bucket, object_key, meta.size
                ),
            )
            .with_source(object_key.clone()),
        );

        Ok(IngestOutcome::Uploaded {
            object_key,
            track_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ObjectMeta;
    use crate::diagnostics::{CollectingSink, Severity};
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    struct MockCatalog {
        response: std::result::Result<Value, String>,
    }

    #[async_trait]
    impl CatalogApiPort for MockCatalog {
        async fn fetch_tracks(&self, _ids: &[String], _token: &str) -> Result<Value> {
            self.response.clone().map_err(|message| PipelineError::Api { message })
        }
    }

    #[derive(Default)]
    struct MockStore {
        puts: Mutex<Vec<(String, String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStorePort for MockStore {
        async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<ObjectMeta> {
            if self.fail {
                return Err(PipelineError::ObjectStore {
                    message: "disk full".to_string(),
                });
            }
            let size = bytes.len() as u64;
            self.puts.lock().await.push((bucket.to_string(), key.to_string(), bytes));
            Ok(ObjectMeta {
                key: key.to_string(),
                size,
                last_modified: None,
                sha256: String::new(),
            })
        }

        async fn get(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>> {
            unreachable!("ingest never reads")
        }

        async fn list(&self, _bucket: &str) -> Result<Vec<ObjectMeta>> {
            unreachable!("ingest never lists")
        }
    }

    fn settings() -> IngestSettings {
        IngestSettings::from(&ObjectStoreConfig::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()
    }

    fn use_case(
        response: std::result::Result<Value, String>,
        store: Arc<MockStore>,
    ) -> (IngestUseCase, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let uc = IngestUseCase::new(Arc::new(MockCatalog { response }), store, settings(), sink.clone());
        (uc, sink)
    }

    #[tokio::test]
    async fn uploads_under_dated_key() {
        let store = Arc::new(MockStore::default());
        let document = json!({"tracks": [{"id": "t1"}, {"id": "t2"}]});
        let (uc, _) = use_case(Ok(document.clone()), store.clone());

        let outcome = uc.run(&["t1".into(), "t2".into()], "token", today()).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Uploaded {
                object_key: "spotify_data/tracks/tracks_2026-02-07.json".to_string(),
                track_count: 2,
            }
        );

        let puts = store.puts.lock().await;
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "row-data");
        let stored: Value = serde_json::from_slice(&puts[0].2).unwrap();
        assert_eq!(stored, document);
    }

    #[tokio::test]
    async fn fetch_failure_skips() {
        let store = Arc::new(MockStore::default());
        let (uc, sink) = use_case(Err("status 401".to_string()), store.clone());

        let outcome = uc.run(&["t1".into()], "token", today()).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Skipped { ref reason } if reason.contains("status 401")));
        assert!(store.puts.lock().await.is_empty());
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[tokio::test]
    async fn empty_tracks_skips() {
        for document in [json!({"tracks": []}), json!({})] {
            let store = Arc::new(MockStore::default());
            let (uc, sink) = use_case(Ok(document), store.clone());
            let outcome = uc.run(&["t1".into()], "token", today()).await.unwrap();
            assert!(matches!(outcome, IngestOutcome::Skipped { .. }));
            assert!(store.puts.lock().await.is_empty());
            assert_eq!(sink.count(Severity::Warning), 1);
        }
    }

    #[tokio::test]
    async fn upload_failure_is_fatal() {
        let store = Arc::new(MockStore {
            fail: true,
            ..MockStore::default()
        });
        let (uc, _) = use_case(Ok(json!({"tracks": [{"id": "t1"}]})), store);
        let err = uc.run(&["t1".into()], "token", today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ObjectStore { .. }));
    }
}
