use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use spotify_staging::app::ingest_use_case::{IngestOutcome, IngestSettings, IngestUseCase};
use spotify_staging::app::stage_use_case::{StageSettings, StageUseCase};
use spotify_staging::config::Config;
use spotify_staging::diagnostics::TracingSink;
use spotify_staging::infra::{FsObjectStore, SpotifyCatalogClient};
use spotify_staging::logging;
use spotify_staging::observability;
use spotify_staging::pipeline::ingestion::read_track_ids;
use spotify_staging::pipeline::storage::{SqliteConnector, StagingLoader};

#[derive(Parser)]
#[command(name = "spotify_staging")]
#[command(about = "Spotify catalog ingestion and staging pipeline")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tracks from the catalog API and upload the raw document
    Ingest {
        /// Comma-separated track ids (defaults to the configured seed file)
        #[arg(long)]
        ids: Option<String>,
    },
    /// Normalize stored documents and upsert them into the staging tables
    Stage,
    /// Run ingest, then stage
    Run {
        #[arg(long)]
        ids: Option<String>,
    },
    /// Create the staging tables
    InitDb,
}

fn staging_loader(config: &Config) -> Result<StagingLoader> {
    let connector = SqliteConnector::create(&config.staging.database_path)
        .with_context(|| format!("preparing staging database {}", config.staging.database_path))?;
    Ok(StagingLoader::new(Arc::new(connector), TracingSink::shared()))
}

fn track_ids(config: &Config, ids: Option<String>) -> Result<Vec<String>> {
    match ids {
        Some(list) => Ok(list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        None => read_track_ids(&config.catalog.track_ids_file)
            .with_context(|| format!("reading track ids from {}", config.catalog.track_ids_file)),
    }
}

async fn ingest(config: &Config, ids: Option<String>) -> Result<IngestOutcome> {
    let ids = track_ids(config, ids)?;
    let token = config
        .catalog
        .token()
        .with_context(|| format!("reading bearer token from ${}", config.catalog.token_env))?;
    let catalog = SpotifyCatalogClient::new(&config.catalog.base_url, config.catalog.timeout())?;
    let use_case = IngestUseCase::new(
        Arc::new(catalog),
        Arc::new(FsObjectStore::new(&config.object_store.root)),
        IngestSettings::from(&config.object_store),
        TracingSink::shared(),
    );

    let outcome = use_case
        .run(&ids, &token, Local::now().date_naive())
        .await
        .context("ingest failed")?;
    match &outcome {
        IngestOutcome::Uploaded { object_key, track_count } => {
            info!(object_key = %object_key, track_count, "Ingest finished");
        }
        IngestOutcome::Skipped { reason } => {
            warn!(reason = %reason, "Ingest skipped");
        }
    }
    Ok(outcome)
}

async fn stage(config: &Config) -> Result<()> {
    let use_case = StageUseCase::new(
        Arc::new(FsObjectStore::new(&config.object_store.root)),
        staging_loader(config)?,
        StageSettings {
            bucket: config.object_store.bucket.clone(),
            category: config.object_store.category.clone(),
            on_invalid_document: config.pipeline.on_invalid_document,
        },
        TracingSink::shared(),
    );

    let report = use_case.run().await.context("staging failed")?;
    info!(
        documents_seen = report.documents_seen,
        documents_loaded = report.documents_loaded,
        skipped = report.skipped.len(),
        artists = report.rows.artists,
        albums = report.rows.albums,
        tracks = report.rows.tracks,
        "Stage finished"
    );
    for skipped in &report.skipped {
        warn!(object_key = %skipped.object_key, reason = %skipped.reason, "Document skipped");
    }
    Ok(())
}

async fn execute(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Ingest { ids } => {
            ingest(config, ids).await?;
        }
        Commands::Stage => stage(config).await?,
        Commands::Run { ids } => match ingest(config, ids).await? {
            IngestOutcome::Uploaded { .. } => stage(config).await?,
            IngestOutcome::Skipped { .. } => warn!("Skipping stage: nothing was ingested"),
        },
        Commands::InitDb => {
            staging_loader(config)?
                .ensure_schema()
                .context("creating staging tables")?;
            info!(path = %config.staging.database_path, "Staging tables ready");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(&cli.log_dir);

    let config = Config::load_or_default(cli.config.as_deref()).context("loading configuration")?;

    if config.metrics.enabled {
        observability::init().context("initializing metrics")?;
    }

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("pipeline_run", run_id = %run_id);
    let result = execute(cli.command, &config).instrument(span).await;

    if let Some(url) = &config.metrics.pushgateway_url {
        let instance = config
            .metrics
            .instance
            .clone()
            .unwrap_or_else(|| run_id.to_string());
        if let Err(e) = observability::push(url, &instance).await {
            warn!("Failed to push metrics: {}", e);
        }
    }

    if let Err(e) = &result {
        error!("Run failed: {:#}", e);
    }
    result
}
