//! Database schema initialization

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{InventoryStore, SCHEMA_VERSION};

impl InventoryStore {
    /// Initialize database schema
    pub(super) fn init_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Articles are the same at every location
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                mk TEXT NOT NULL,
                artikelnr TEXT NOT NULL,
                benamning TEXT,
                benamning2 TEXT,
                extrainfo TEXT,
                bild INTEGER,
                paket TEXT,
                fordon TEXT,
                alternativart TEXT,
                ersatter TEXT,
                ersatt_av TEXT,
                data TEXT,
                created_at TEXT,
                updated_at TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_mk_artikelnr
                ON articles(mk, artikelnr);

            -- Stock per location
            CREATE TABLE IF NOT EXISTS inventory (
                id TEXT PRIMARY KEY,
                location TEXT NOT NULL,
                mk TEXT NOT NULL,
                artikelnr TEXT NOT NULL,
                status TEXT,
                lagerplats TEXT,
                location_data TEXT,
                created_at TEXT,
                updated_at TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_inventory_mk_artikelnr_location
                ON inventory(mk, artikelnr, location);
            CREATE INDEX IF NOT EXISTS idx_inventory_status ON inventory(status);
            CREATE INDEX IF NOT EXISTS idx_inventory_location ON inventory(location);
            CREATE INDEX IF NOT EXISTS idx_inventory_updated_at ON inventory(updated_at);

            -- Seed/sync bookkeeping
            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
            )
            .into_diagnostic()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .into_diagnostic()?;

        Ok(())
    }
}
