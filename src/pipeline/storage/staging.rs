use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::schema::{ensure_schema, TableSchema, ALBUMS_TABLE, ARTISTS_TABLE, TRACKS_TABLE};
use crate::constants::UPSERT_PAGE_SIZE;
use crate::diagnostics::{Diagnostic, SharedSink, Stage};
use crate::domain::{Album, Artist, NormalizedBatch, Track};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;

/// A record type that maps onto one staging table row.
pub trait StagingRecord {
    /// Column names, in the order `values` returns them.
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;
}

/// Hands out a fresh connection for each upsert call.
pub trait ConnectionProvider: Send + Sync {
    fn connect(&self) -> rusqlite::Result<Connection>;
}

/// Opens the staging SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Like `new`, creating the parent directory first.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let connector = Self::new(path);
        if let Some(parent) = connector.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(connector)
    }
}

impl ConnectionProvider for SqliteConnector {
    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        // concurrent runs may upsert into the same tables
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

/// Rows written per table by [`StagingLoader::load_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.artists + self.albums + self.tracks
    }

    pub fn add(&mut self, other: LoadSummary) {
        self.artists += other.artists;
        self.albums += other.albums;
        self.tracks += other.tracks;
    }
}

/// Applies record collections to staging tables with upsert-by-key semantics.
pub struct StagingLoader {
    provider: Arc<dyn ConnectionProvider>,
    sink: SharedSink,
}

impl StagingLoader {
    pub fn new(provider: Arc<dyn ConnectionProvider>, sink: SharedSink) -> Self {
        Self { provider, sink }
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self
            .provider
            .connect()
            .map_err(|e| PipelineError::persistence("staging schema", e))?;
        ensure_schema(&conn).map_err(|e| PipelineError::persistence("staging schema", e))
    }

    /// Insert `records` into `table`, overwriting every non-key column of rows
    /// whose `primary_key` already exists. Empty input returns immediately
    /// without opening a connection. The whole call is one transaction.
    pub fn upsert<R: StagingRecord>(
        &self,
        table: &TableSchema,
        records: &[R],
        primary_key: &str,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        check_schema::<R>(table, primary_key)?;

        let started = Instant::now();
        let result = self
            .provider
            .connect()
            .and_then(|mut conn| apply_upsert(&mut conn, table, records));

        match result {
            Ok(()) => {
                metrics::load::rows_upserted(table.name, records.len());
                metrics::load::upsert_duration(table.name, started.elapsed().as_secs_f64());
                self.sink.emit(Diagnostic::info(
                    Stage::Load,
                    format!("Loaded {} records into {}", records.len(), table.name),
                ));
                Ok(records.len())
            }
            Err(e) => {
                metrics::load::upsert_error(table.name);
                self.sink.emit(Diagnostic::error(
                    Stage::Load,
                    format!("Error occurred when loading {} records into {}: {}", records.len(), table.name, e),
                ));
                Err(PipelineError::persistence(table.name, e))
            }
        }
    }

    /// Upsert artists, albums and tracks, in that order, one transaction each.
    pub fn load_batch(&self, batch: &NormalizedBatch) -> Result<LoadSummary> {
        let summary = LoadSummary {
            artists: self.upsert_or_warn(&ARTISTS_TABLE, &batch.artists, "artists")?,
            albums: self.upsert_or_warn(&ALBUMS_TABLE, &batch.albums, "albums")?,
            tracks: self.upsert_or_warn(&TRACKS_TABLE, &batch.tracks, "tracks")?,
        };

        if summary.total() == 0 {
            self.sink.emit(Diagnostic::warning(
                Stage::Load,
                "No data was loaded. All input lists are empty.",
            ));
        }
        Ok(summary)
    }

    fn upsert_or_warn<R: StagingRecord>(&self, table: &TableSchema, records: &[R], label: &str) -> Result<usize> {
        if records.is_empty() {
            self.sink.emit(Diagnostic::warning(Stage::Load, format!("No {} data to load.", label)));
            return Ok(0);
        }
        self.upsert(table, records, table.primary_key)
    }
}

fn apply_upsert<R: StagingRecord>(conn: &mut Connection, table: &TableSchema, records: &[R]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for page in records.chunks(UPSERT_PAGE_SIZE) {
        let sql = upsert_sql(table.name, R::COLUMNS, table.primary_key, page.len());
        let mut stmt = tx.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(page.iter().flat_map(|r| r.values())))?;
    }
    // dropping an uncommitted transaction rolls it back
    tx.commit()
}

/// Multi-row `INSERT ... ON CONFLICT(pk) DO UPDATE` rewriting every non-key column.
pub fn upsert_sql(table: &str, columns: &[&str], primary_key: &str, rows: usize) -> String {
    let row = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![row; rows].join(", ");
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != primary_key)
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT({}) {}",
        table,
        columns.join(", "),
        values,
        primary_key,
        action
    )
}

fn check_schema<R: StagingRecord>(table: &TableSchema, primary_key: &str) -> Result<()> {
    let mismatch = |detail: String| PipelineError::SchemaMismatch {
        table: table.name.to_string(),
        detail,
    };

    if primary_key != table.primary_key {
        return Err(mismatch(format!(
            "primary key '{}' does not match declared key '{}'",
            primary_key, table.primary_key
        )));
    }

    let provided: HashSet<&str> = R::COLUMNS.iter().copied().collect();
    if provided.len() != R::COLUMNS.len() {
        return Err(mismatch("record declares duplicate columns".to_string()));
    }

    let declared: HashSet<&str> = table.column_names().collect();
    if provided != declared {
        let mut missing: Vec<&str> = declared.difference(&provided).copied().collect();
        let mut unexpected: Vec<&str> = provided.difference(&declared).copied().collect();
        missing.sort_unstable();
        unexpected.sort_unstable();
        return Err(mismatch(format!(
            "missing columns {:?}, unexpected columns {:?}",
            missing, unexpected
        )));
    }
    Ok(())
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn integer(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn date(value: NaiveDate) -> Value {
    Value::Text(value.format("%Y-%m-%d").to_string())
}

impl StagingRecord for Artist {
    const COLUMNS: &'static [&'static str] = &["artist_id", "name", "created_at"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist_id.clone()),
            text(&self.name),
            date(self.created_at),
        ]
    }
}

impl StagingRecord for Album {
    const COLUMNS: &'static [&'static str] = &[
        "album_id",
        "main_artist_id",
        "name",
        "release_date",
        "release_date_precision",
        "total_tracks",
        "album_type",
        "created_at",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.album_id.clone()),
            text(&self.main_artist_id),
            text(&self.name),
            self.release_date.map(date).unwrap_or(Value::Null),
            text(&self.release_date_precision),
            integer(self.total_tracks),
            text(&self.album_type),
            date(self.created_at),
        ]
    }
}

impl StagingRecord for Track {
    const COLUMNS: &'static [&'static str] = &[
        "track_id",
        "name",
        "artist_id",
        "album_id",
        "popularity",
        "duration_ms",
        "track_number",
        "disc_number",
        "is_local",
        "created_at",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.track_id.clone()),
            text(&self.name),
            text(&self.artist_id),
            text(&self.album_id),
            integer(self.popularity),
            integer(self.duration_ms),
            integer(self.track_number),
            integer(self.disc_number),
            Value::Integer(i64::from(self.is_local)),
            date(self.created_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()
    }

    fn artist(id: &str, name: &str) -> Artist {
        Artist {
            artist_id: id.to_string(),
            name: Some(name.to_string()),
            created_at: day(),
        }
    }

    fn track(id: &str) -> Track {
        Track {
            track_id: id.to_string(),
            name: Some(format!("Track {}", id)),
            artist_id: Some("ar1".into()),
            album_id: Some("al1".into()),
            popularity: Some(50),
            duration_ms: Some(180000),
            track_number: Some(1),
            disc_number: Some(1),
            is_local: true,
            created_at: day(),
        }
    }

    struct CountingConnector {
        inner: SqliteConnector,
        connects: AtomicUsize,
    }

    impl ConnectionProvider for CountingConnector {
        fn connect(&self) -> rusqlite::Result<Connection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.inner.connect()
        }
    }

    struct Fixture {
        _dir: TempDir,
        connector: Arc<CountingConnector>,
        loader: StagingLoader,
        sink: Arc<CollectingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let connector = Arc::new(CountingConnector {
                inner: SqliteConnector::new(dir.path().join("staging.db")),
                connects: AtomicUsize::new(0),
            });
            let sink = Arc::new(CollectingSink::new());
            let loader = StagingLoader::new(connector.clone(), sink.clone());
            loader.ensure_schema().unwrap();
            Self {
                _dir: dir,
                connector,
                loader,
                sink,
            }
        }

        fn connects(&self) -> usize {
            self.connector.connects.load(Ordering::SeqCst)
        }

        fn artists(&self) -> Vec<(String, Option<String>, String)> {
            let conn = self.connector.inner.connect().unwrap();
            let mut stmt = conn
                .prepare("SELECT artist_id, name, created_at FROM stg_artists ORDER BY artist_id")
                .unwrap();
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .unwrap();
            rows.collect::<rusqlite::Result<Vec<_>>>().unwrap()
        }
    }

    #[test]
    fn empty_input_never_connects() {
        let fx = Fixture::new();
        let before = fx.connects();
        let written = fx.loader.upsert::<Artist>(&ARTISTS_TABLE, &[], "artist_id").unwrap();
        assert_eq!(written, 0);
        assert_eq!(fx.connects(), before);
    }

    #[test]
    fn upsert_inserts_then_overwrites() {
        let fx = Fixture::new();
        fx.loader
            .upsert(&ARTISTS_TABLE, &[artist("ar1", "Old"), artist("ar2", "Other")], "artist_id")
            .unwrap();
        fx.loader
            .upsert(&ARTISTS_TABLE, &[artist("ar1", "New")], "artist_id")
            .unwrap();

        assert_eq!(
            fx.artists(),
            vec![
                ("ar1".to_string(), Some("New".to_string()), "2026-02-07".to_string()),
                ("ar2".to_string(), Some("Other".to_string()), "2026-02-07".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_upsert_is_idempotent() {
        let fx = Fixture::new();
        let records = vec![artist("ar1", "A"), artist("ar2", "B")];
        fx.loader.upsert(&ARTISTS_TABLE, &records, "artist_id").unwrap();
        let once = fx.artists();
        fx.loader.upsert(&ARTISTS_TABLE, &records, "artist_id").unwrap();
        assert_eq!(fx.artists(), once);
    }

    #[test]
    fn last_duplicate_in_a_batch_wins() {
        let fx = Fixture::new();
        fx.loader
            .upsert(&ARTISTS_TABLE, &[artist("ar1", "First"), artist("ar1", "Second")], "artist_id")
            .unwrap();
        let rows = fx.artists();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.as_deref(), Some("Second"));
    }

    #[test]
    fn null_fields_overwrite_existing_values() {
        let fx = Fixture::new();
        fx.loader.upsert(&ARTISTS_TABLE, &[artist("ar1", "Named")], "artist_id").unwrap();
        let nameless = Artist {
            artist_id: "ar1".into(),
            name: None,
            created_at: day(),
        };
        fx.loader.upsert(&ARTISTS_TABLE, &[nameless], "artist_id").unwrap();
        assert_eq!(fx.artists()[0].1, None);
    }

    #[test]
    fn failing_row_rolls_back_whole_call() {
        let fx = Fixture::new();
        {
            let conn = fx.connector.inner.connect().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON stg_artists
                 WHEN NEW.name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'boom rejected'); END;",
            )
            .unwrap();
        }

        let err = fx
            .loader
            .upsert(&ARTISTS_TABLE, &[artist("ar1", "fine"), artist("ar2", "boom")], "artist_id")
            .unwrap_err();

        assert!(matches!(err, PipelineError::Persistence { ref table, .. } if table == "stg_artists"));
        assert!(fx.artists().is_empty());
        assert_eq!(fx.sink.count(Severity::Error), 1);
    }

    #[test]
    fn pages_share_one_transaction() {
        let fx = Fixture::new();
        let records: Vec<Artist> = (0..UPSERT_PAGE_SIZE * 2 + 5)
            .map(|i| artist(&format!("ar{:04}", i), "bulk"))
            .collect();
        let before = fx.connects();
        let written = fx.loader.upsert(&ARTISTS_TABLE, &records, "artist_id").unwrap();
        assert_eq!(written, records.len());
        assert_eq!(fx.connects(), before + 1);
        assert_eq!(fx.artists().len(), records.len());
    }

    #[test]
    fn wrong_primary_key_is_rejected_before_connecting() {
        let fx = Fixture::new();
        let before = fx.connects();
        let err = fx
            .loader
            .upsert(&ARTISTS_TABLE, &[artist("ar1", "A")], "name")
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
        assert_eq!(fx.connects(), before);
    }

    struct NarrowArtist {
        artist_id: String,
    }

    impl StagingRecord for NarrowArtist {
        const COLUMNS: &'static [&'static str] = &["artist_id", "genre"];

        fn values(&self) -> Vec<Value> {
            vec![Value::Text(self.artist_id.clone()), Value::Null]
        }
    }

    #[test]
    fn column_drift_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .loader
            .upsert(&ARTISTS_TABLE, &[NarrowArtist { artist_id: "ar1".into() }], "artist_id")
            .unwrap_err();
        match err {
            PipelineError::SchemaMismatch { detail, .. } => {
                assert!(detail.contains("created_at"));
                assert!(detail.contains("genre"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn record_columns_match_declared_tables() {
        assert!(check_schema::<Artist>(&ARTISTS_TABLE, "artist_id").is_ok());
        assert!(check_schema::<Album>(&ALBUMS_TABLE, "album_id").is_ok());
        assert!(check_schema::<Track>(&TRACKS_TABLE, "track_id").is_ok());
    }

    #[test]
    fn load_batch_writes_all_three_tables() {
        let fx = Fixture::new();
        let batch = NormalizedBatch {
            artists: vec![artist("ar1", "A")],
            albums: vec![Album {
                album_id: "al1".into(),
                main_artist_id: Some("ar1".into()),
                name: Some("Album".into()),
                release_date: NaiveDate::from_ymd_opt(2019, 5, 1),
                release_date_precision: Some("month".into()),
                total_tracks: Some(10),
                album_type: Some("album".into()),
                created_at: day(),
            }],
            tracks: vec![track("t1"), track("t2")],
        };

        let summary = fx.loader.load_batch(&batch).unwrap();
        assert_eq!(summary, LoadSummary { artists: 1, albums: 1, tracks: 2 });

        let conn = fx.connector.inner.connect().unwrap();
        let (release_date, is_local): (String, i64) = conn
            .query_row(
                "SELECT a.release_date, t.is_local FROM stg_tracks t JOIN stg_albums a ON a.album_id = t.album_id WHERE t.track_id = 't1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(release_date, "2019-05-01");
        assert_eq!(is_local, 1);
    }

    #[test]
    fn empty_batch_warns_without_connecting() {
        let fx = Fixture::new();
        let before = fx.connects();
        let summary = fx.loader.load_batch(&NormalizedBatch::default()).unwrap();
        assert_eq!(summary.total(), 0);
        assert_eq!(fx.connects(), before);
        assert_eq!(fx.sink.count(Severity::Warning), 4);
    }

    #[test]
    fn sql_rewrites_every_non_key_column() {
        let sql = upsert_sql("stg_artists", Artist::COLUMNS, "artist_id", 2);
        assert_eq!(
            sql,
            "INSERT INTO stg_artists (artist_id, name, created_at) VALUES (?, ?, ?), (?, ?, ?) \
             ON CONFLICT(artist_id) DO UPDATE SET name = excluded.name, created_at = excluded.created_at"
        );
        assert!(upsert_sql("t", &["id"], "id", 1).ends_with("DO NOTHING"));
    }
}
