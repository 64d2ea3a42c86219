//! SQLite-backed inventory store
//!
//! The store holds the same data as a snapshot, split the way the snapshot
//! is split: an `articles` table keyed by `(mk, artikelnr)` and an
//! `inventory` table keyed by `(mk, artikelnr, location)`. It is filled
//! wholesale by [`InventoryStore::seed`] or [`InventoryStore::sync`] and
//! queried with filter, sort and pagination pushed down into SQL.
//!
//! The database is local state and is rebuilt when the schema version changes.

mod queries;
mod schema;
mod sync;

pub use sync::SyncStats;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use miette::{IntoDiagnostic, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::query::contains_ignore_case;

/// Current schema version - the store is recreated on mismatch
const SCHEMA_VERSION: i32 = 3;

/// Name of the registered case-insensitive containment function
pub(crate) const ICONTAINS_FN: &str = "lager_icontains";

/// The inventory store backed by SQLite
pub struct InventoryStore {
    conn: Connection,
    path: Option<PathBuf>,
}

/// Store statistics
#[derive(Debug, Default)]
pub struct StoreStats {
    pub articles: usize,
    pub inventory: usize,
    pub locations: usize,
    pub last_sync: Option<String>,
    pub source: Option<String>,
    pub db_size_bytes: u64,
}

impl InventoryStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let conn = Connection::open(path).into_diagnostic()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .into_diagnostic()?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_diagnostic()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        register_functions(&conn).into_diagnostic()?;

        let mut store = Self { conn, path };
        if store.needs_schema_rebuild()? {
            store.reinitialize_schema()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if schema version matches current version
    fn needs_schema_rebuild(&self) -> Result<bool> {
        let current_version: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        Ok(current_version != SCHEMA_VERSION)
    }

    /// Drop all tables and recreate the schema
    fn reinitialize_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                DROP TABLE IF EXISTS schema_version;
                DROP TABLE IF EXISTS inventory;
                DROP TABLE IF EXISTS articles;
                DROP TABLE IF EXISTS store_meta;
                "#,
            )
            .into_diagnostic()?;

        self.init_schema()
    }

    /// Row counts and metadata
    pub fn statistics(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            self.conn
                .query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .into_diagnostic()
        };

        let db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            articles: count("SELECT COUNT(*) FROM articles")?,
            inventory: count("SELECT COUNT(*) FROM inventory")?,
            locations: count("SELECT COUNT(DISTINCT location) FROM inventory")?,
            last_sync: self.meta("last_sync")?,
            source: self.meta("source")?,
            db_size_bytes,
        })
    }

    /// Whether the store holds no inventory rows
    pub fn is_empty(&self) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM inventory", [], |row| row.get(0))
            .into_diagnostic()?;
        Ok(n == 0)
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()
    }
}

/// Register the Unicode-aware `lager_icontains(haystack, needle)` function
///
/// Returns NULL when either argument is NULL so `NOT lager_icontains(..)`
/// excludes missing values, like the other negated comparisons.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        ICONTAINS_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(h), Some(n)) => Some(contains_ignore_case(&h, &n)),
                _ => None,
            })
        },
    )
}

/// Fixed-width RFC 3339 so text comparison orders chronologically
pub(crate) fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
