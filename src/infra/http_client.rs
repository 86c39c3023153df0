use crate::app::ports::CatalogApiPort;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Catalog API client for `GET {base_url}/tracks?ids=...`.
pub struct SpotifyCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl SpotifyCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spotify_staging/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn tracks_url(&self) -> String {
        format!("{}/tracks", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CatalogApiPort for SpotifyCatalogClient {
    async fn fetch_tracks(&self, ids: &[String], token: &str) -> Result<Value> {
        if ids.is_empty() {
            return Err(PipelineError::Config("no track ids to fetch".to_string()));
        }
        if token.trim().is_empty() {
            return Err(PipelineError::Config("catalog bearer token is empty".to_string()));
        }

        let url = self.tracks_url();
        let started = Instant::now();
        debug!(url = %url, ids = ids.len(), "Requesting catalog tracks");

        let resp = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(","))])
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                metrics::ingest::request_error(if e.is_timeout() { "timeout" } else { "transport" });
                PipelineError::Http(e)
            })?;

        let status = resp.status();
        metrics::ingest::request_duration(started.elapsed().as_secs_f64());
        if !status.is_success() {
            metrics::ingest::request_error("status");
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Catalog request failed");
            return Err(PipelineError::Api {
                message: format!("status {}: {}", status.as_u16(), body),
            });
        }

        let bytes = resp.bytes().await?;
        let document: Value = serde_json::from_slice(&bytes).map_err(|e| {
            metrics::ingest::request_error("decode");
            PipelineError::Json(e)
        })?;
        metrics::ingest::request_success();
        Ok(document)
    }
}
