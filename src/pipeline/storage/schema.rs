//! Declared staging tables. DDL is generated from these declarations and
//! every upsert is checked against them.

use rusqlite::Connection;

use crate::constants::{ALBUM_PK, ARTIST_PK, STG_ALBUMS, STG_ARTISTS, STG_TRACKS, TRACK_PK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef { name, sql_type }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.name == self.primary_key {
                    format!("{} {} NOT NULL PRIMARY KEY", c.name, c.sql_type)
                } else {
                    format!("{} {}", c.name, c.sql_type)
                }
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            columns.join(",\n    ")
        )
    }
}

pub const ARTISTS_TABLE: TableSchema = TableSchema {
    name: STG_ARTISTS,
    primary_key: ARTIST_PK,
    columns: &[
        col("artist_id", "TEXT"),
        col("name", "TEXT"),
        col("created_at", "TEXT"),
    ],
};

pub const ALBUMS_TABLE: TableSchema = TableSchema {
    name: STG_ALBUMS,
    primary_key: ALBUM_PK,
    columns: &[
        col("album_id", "TEXT"),
        col("main_artist_id", "TEXT"),
        col("name", "TEXT"),
        col("release_date", "TEXT"),
        col("release_date_precision", "TEXT"),
        col("total_tracks", "INTEGER"),
        col("album_type", "TEXT"),
        col("created_at", "TEXT"),
    ],
};

pub const TRACKS_TABLE: TableSchema = TableSchema {
    name: STG_TRACKS,
    primary_key: TRACK_PK,
    columns: &[
        col("track_id", "TEXT"),
        col("name", "TEXT"),
        col("artist_id", "TEXT"),
        col("album_id", "TEXT"),
        col("popularity", "INTEGER"),
        col("duration_ms", "INTEGER"),
        col("track_number", "INTEGER"),
        col("disc_number", "INTEGER"),
        col("is_local", "INTEGER"),
        col("created_at", "TEXT"),
    ],
};

pub const STAGING_TABLES: [&TableSchema; 3] = [&ARTISTS_TABLE, &ALBUMS_TABLE, &TRACKS_TABLE];

/// Create any missing staging table.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    let mut ddl = String::new();
    for table in STAGING_TABLES {
        ddl.push_str(&table.create_table_sql());
        ddl.push_str(";\n");
    }
    conn.execute_batch(&ddl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_is_a_declared_column() {
        for table in STAGING_TABLES {
            assert!(table.has_column(table.primary_key), "{}", table.name);
        }
    }

    #[test]
    fn ddl_marks_primary_key() {
        let sql = ARTISTS_TABLE.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS stg_artists"));
        assert!(sql.contains("artist_id TEXT NOT NULL PRIMARY KEY"));
        assert!(sql.contains("created_at TEXT"));
    }

    #[test]
    fn ensure_schema_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'stg_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
