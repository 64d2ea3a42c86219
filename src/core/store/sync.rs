//! Bulk loading of snapshots into the store
//!
//! `seed` replaces the store wholesale. `sync` reconciles it with a newer
//! snapshot: vanished rows are deleted, changed rows are updated in place and
//! new rows are inserted. Both run in one transaction.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, Connection, ToSql};
use serde::Serialize;
use ulid::Ulid;

use super::{format_timestamp, InventoryStore};
use crate::core::record::{article_key, stock_key, Article, StockEntry};
use crate::core::snapshot::Snapshot;

/// Rows per insert batch and per `IN (...)` delete list
const BATCH_SIZE: usize = 1000;

const UPSERT_ARTICLE: &str = r#"
    INSERT INTO articles (id, mk, artikelnr, benamning, benamning2, extrainfo, bild,
                          paket, fordon, alternativart, ersatter, ersatt_av, data,
                          created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
    ON CONFLICT(mk, artikelnr) DO UPDATE SET
        benamning = excluded.benamning,
        benamning2 = excluded.benamning2,
        extrainfo = excluded.extrainfo,
        bild = excluded.bild,
        paket = excluded.paket,
        fordon = excluded.fordon,
        alternativart = excluded.alternativart,
        ersatter = excluded.ersatter,
        ersatt_av = excluded.ersatt_av,
        data = excluded.data,
        updated_at = excluded.updated_at
    WHERE articles.data IS NOT excluded.data
"#;

const UPSERT_INVENTORY: &str = r#"
    INSERT INTO inventory (id, location, mk, artikelnr, status, lagerplats, location_data,
                           created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(mk, artikelnr, location) DO UPDATE SET
        status = excluded.status,
        lagerplats = excluded.lagerplats,
        location_data = excluded.location_data,
        updated_at = excluded.updated_at
    WHERE inventory.location_data IS NOT excluded.location_data
"#;

/// Statistics from a seed or sync
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Articles inserted or changed
    pub articles_upserted: usize,
    /// Stock entries inserted or changed
    pub inventory_upserted: usize,
    pub articles_deleted: usize,
    pub inventory_deleted: usize,
    /// Rows already identical to the snapshot
    pub unchanged: usize,
    /// Snapshot items dropped for missing keys
    pub skipped: usize,
    pub duration_ms: u64,
}

impl InventoryStore {
    /// Replace the store contents with a snapshot
    pub fn seed(&mut self, snapshot: &Snapshot, source: &str) -> Result<SyncStats> {
        let start = Instant::now();
        let now = Utc::now();
        let mut stats = SyncStats {
            skipped: snapshot.skipped,
            ..Default::default()
        };

        let tx = self.conn.transaction().into_diagnostic()?;
        tx.execute_batch(
            r#"
            DELETE FROM inventory;
            DELETE FROM articles;
            "#,
        )
        .into_diagnostic()?;

        let (articles, entries) = upsert_snapshot(&tx, snapshot)?;
        stats.articles_upserted = articles;
        stats.inventory_upserted = entries;

        record_sync(&tx, "seed", source, now)?;
        tx.commit().into_diagnostic()?;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(?stats, source, "seeded inventory store");
        Ok(stats)
    }

    /// Reconcile the store with a snapshot
    pub fn sync(&mut self, snapshot: &Snapshot, source: &str) -> Result<SyncStats> {
        let start = Instant::now();
        let now = Utc::now();
        let mut stats = SyncStats {
            skipped: snapshot.skipped,
            ..Default::default()
        };

        let tx = self.conn.transaction().into_diagnostic()?;

        let live_entries: HashSet<String> = snapshot.entries.iter().map(StockEntry::key).collect();
        let stale_entries = stale_ids(
            &tx,
            "SELECT id, mk, artikelnr, location FROM inventory",
            |mk, artikelnr, location| {
                live_entries.contains(&stock_key(mk, artikelnr, location.unwrap_or_default()))
            },
        )?;
        stats.inventory_deleted = delete_ids(&tx, "inventory", &stale_entries)?;

        let live_articles: HashSet<String> = snapshot.articles.iter().map(Article::key).collect();
        let stale_articles = stale_ids(
            &tx,
            "SELECT id, mk, artikelnr, NULL FROM articles",
            |mk, artikelnr, _| live_articles.contains(&article_key(mk, artikelnr)),
        )?;
        stats.articles_deleted = delete_ids(&tx, "articles", &stale_articles)?;

        let (articles, entries) = upsert_snapshot(&tx, snapshot)?;
        stats.articles_upserted = articles;
        stats.inventory_upserted = entries;
        stats.unchanged =
            snapshot.articles.len() + snapshot.entries.len() - articles - entries;

        record_sync(&tx, "sync", source, now)?;
        tx.commit().into_diagnostic()?;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(?stats, source, "synced inventory store");
        Ok(stats)
    }

    /// Delete all rows and bookkeeping
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            DELETE FROM inventory;
            DELETE FROM articles;
            DELETE FROM store_meta;
            "#,
            )
            .into_diagnostic()
    }
}

/// Upsert every article and stock entry; returns rows actually written
fn upsert_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<(usize, usize)> {
    let articles_by_key: HashMap<String, &Article> =
        snapshot.articles.iter().map(|a| (a.key(), a)).collect();

    let mut article_stmt = conn.prepare(UPSERT_ARTICLE).into_diagnostic()?;
    let mut articles_written = 0;
    for (n, batch) in snapshot.articles.chunks(BATCH_SIZE).enumerate() {
        for article in batch {
            articles_written += upsert_article(&mut article_stmt, article)?;
        }
        tracing::debug!(batch = n + 1, rows = batch.len(), "wrote article batch");
    }

    let mut entry_stmt = conn.prepare(UPSERT_INVENTORY).into_diagnostic()?;
    let mut entries_written = 0;
    for (n, batch) in snapshot.entries.chunks(BATCH_SIZE).enumerate() {
        for entry in batch {
            let article = articles_by_key
                .get(&article_key(&entry.mk, &entry.artikelnr))
                .copied();
            entries_written += upsert_entry(&mut entry_stmt, entry, article)?;
        }
        tracing::debug!(batch = n + 1, rows = batch.len(), "wrote inventory batch");
    }

    Ok((articles_written, entries_written))
}

fn upsert_article(stmt: &mut rusqlite::Statement<'_>, article: &Article) -> Result<usize> {

    stmt.execute(params![
        Ulid::new().to_string(),
        article.mk,
        article.artikelnr,
        article.benamning,
        article.benamning2,
        article.extrainfo,
        article.bild,
        to_json(&article.paket)?,
        to_json(&article.fordon)?,
        to_json(&article.alternativart)?,
        to_json(&article.ersatter)?,
        to_json(&article.ersatt_av)?,
        to_json(article)?,
        article.created_at.as_ref().map(format_timestamp),
        article.updated_at.as_ref().map(format_timestamp),
    ])
    .into_diagnostic()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).into_diagnostic()
}

fn upsert_entry(
    stmt: &mut rusqlite::Statement<'_>,
    entry: &StockEntry,
    article: Option<&Article>,
) -> Result<usize> {
    // Undated entries inherit the article's timestamps, as the joined row does
    let created = entry.created_at.or(article.and_then(|a| a.created_at));
    let updated = entry.updated_at.or(article.and_then(|a| a.updated_at));
    let location_data = serde_json::json!({
        "status": entry.status,
        "lagerplats": entry.lagerplats,
    });

    stmt.execute(params![
        Ulid::new().to_string(),
        entry.location,
        entry.mk,
        entry.artikelnr,
        entry.status,
        entry.lagerplats,
        location_data.to_string(),
        created.as_ref().map(format_timestamp),
        updated.as_ref().map(format_timestamp),
    ])
    .into_diagnostic()
}

/// Ids of stored rows whose key is not live
fn stale_ids(
    conn: &Connection,
    sql: &str,
    is_live: impl Fn(&str, &str, Option<&str>) -> bool,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql).into_diagnostic()?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .into_diagnostic()?;

    let mut stale = Vec::new();
    for row in rows {
        let (id, mk, artikelnr, location) = row.into_diagnostic()?;
        if !is_live(&mk, &artikelnr, location.as_deref()) {
            stale.push(id);
        }
    }
    Ok(stale)
}

/// Delete rows by id in `IN (...)` batches
fn delete_ids(conn: &Connection, table: &str, ids: &[String]) -> Result<usize> {
    let mut deleted = 0;
    for batch in ids.chunks(BATCH_SIZE) {
        let sql = format!(
            "DELETE FROM {} WHERE id IN ({})",
            table,
            vec!["?"; batch.len()].join(", ")
        );
        let params_refs: Vec<&dyn ToSql> = batch.iter().map(|id| id as &dyn ToSql).collect();
        deleted += conn.execute(&sql, params_refs.as_slice()).into_diagnostic()?;
    }
    if deleted > 0 {
        tracing::debug!(table, deleted, "removed vanished rows");
    }
    Ok(deleted)
}

fn record_sync(conn: &Connection, kind: &str, source: &str, now: DateTime<Utc>) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)")
        .into_diagnostic()?;
    for (key, value) in [
        ("last_sync", format_timestamp(&now)),
        ("last_operation", kind.to_string()),
        ("source", source.to_string()),
    ] {
        stmt.execute(params![key, value]).into_diagnostic()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::InventoryQuery;
    use crate::core::snapshot::{sanitize, split_rows};
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> Snapshot {
        split_rows(&sanitize(&value).unwrap())
    }

    fn all_rows(store: &InventoryStore) -> Vec<crate::core::record::InventoryRow> {
        store
            .query(&InventoryQuery {
                per_page: 100,
                ..Default::default()
            })
            .unwrap()
            .data
    }

    #[test]
    fn test_seed_replaces_contents() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        store
            .seed(&snapshot(json!({"P": [{"MK": "VO", "Artikelnr": "1"}]})), "a.json")
            .unwrap();
        let stats = store
            .seed(
                &snapshot(json!({"P": [
                    {"MK": "SA", "Artikelnr": "2"},
                    {"MK": "SA", "Artikelnr": "3"},
                    {"Artikelnr": "4"}
                ]})),
                "b.json",
            )
            .unwrap();

        assert_eq!(stats.inventory_upserted, 2);
        assert_eq!(stats.skipped, 1);
        let rows = all_rows(&store);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.mk == "SA"));
        assert_eq!(store.statistics().unwrap().source.as_deref(), Some("b.json"));
    }

    #[test]
    fn test_sync_deletes_updates_and_inserts() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        store
            .seed(
                &snapshot(json!({
                    "P": [
                        {"MK": "VO", "Artikelnr": "1", "Status": "J"},
                        {"MK": "VO", "Artikelnr": "2", "Status": "J"}
                    ],
                    "K": [{"MK": "VO", "Artikelnr": "1", "Status": "B"}]
                })),
                "v1",
            )
            .unwrap();

        let stats = store
            .sync(
                &snapshot(json!({
                    "P": [
                        {"MK": "VO", "Artikelnr": "1", "Status": "N"},
                        {"MK": "VO", "Artikelnr": "3", "Status": "J"}
                    ],
                    "K": [{"MK": "VO", "Artikelnr": "1", "Status": "B"}]
                })),
                "v2",
            )
            .unwrap();

        assert_eq!(stats.inventory_deleted, 1);
        assert_eq!(stats.articles_deleted, 1);
        // P/1 changed, P/3 new, article 3 new
        assert_eq!(stats.inventory_upserted, 2);
        assert_eq!(stats.articles_upserted, 1);
        // article 1 and K/1
        assert_eq!(stats.unchanged, 2);

        let rows = all_rows(&store);
        let mut keys: Vec<String> = rows.iter().map(|r| r.key()).collect();
        keys.sort();
        assert_eq!(keys, vec!["VO::1::K", "VO::1::P", "VO::3::P"]);
        let p1 = rows.iter().find(|r| r.key() == "VO::1::P").unwrap();
        assert_eq!(p1.status.as_deref(), Some("N"));
    }

    #[test]
    fn test_sync_keeps_row_ids_of_updated_rows() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        let v1 = snapshot(json!({"P": [{"MK": "VO", "Artikelnr": "1", "Status": "J"}]}));
        store.seed(&v1, "v1").unwrap();
        let before = all_rows(&store)[0].id.clone();

        let v2 = snapshot(json!({"P": [{"MK": "VO", "Artikelnr": "1", "Status": "B"}]}));
        store.sync(&v2, "v2").unwrap();
        let after = &all_rows(&store)[0];
        assert_eq!(after.id, before);
        assert_eq!(after.status.as_deref(), Some("B"));
    }

    #[test]
    fn test_delete_ids_batches_large_lists() {
        let store = InventoryStore::open_in_memory().unwrap();
        let ids: Vec<String> = (0..2500).map(|n| n.to_string()).collect();
        assert_eq!(delete_ids(&store.conn, "inventory", &ids).unwrap(), 0);
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        store
            .seed(&snapshot(json!({"P": [{"MK": "VO", "Artikelnr": "1"}]})), "a")
            .unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.statistics().unwrap().last_sync.is_none());
    }
}
