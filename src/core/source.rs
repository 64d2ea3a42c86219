//! Inventory sources
//!
//! Queries and facet counts are answered either from the JSON snapshot, read
//! and evaluated in memory on every call, or from the SQLite store with
//! filtering pushed down into SQL. [`CachedSource`] puts the TTL result
//! cache in front of either.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::cache::{cache_key, ResultCache};
use crate::core::facets::{self, FacetOption};
use crate::core::query::{self, Column, InventoryQuery, Page, QueryError};
use crate::core::record::InventoryRow;
use crate::core::snapshot::load_rows;
use crate::core::store::InventoryStore;

/// Which backend answers queries
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON snapshot evaluated in memory
    #[default]
    Snapshot,
    /// SQLite store
    Store,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Snapshot => write!(f, "snapshot"),
            SourceKind::Store => write!(f, "store"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snapshot" | "json" | "file" => Ok(SourceKind::Snapshot),
            "store" | "db" | "sqlite" => Ok(SourceKind::Store),
            other => Err(format!("unknown source '{}' (expected snapshot or store)", other)),
        }
    }
}

/// Anything that can answer inventory queries and facet counts
pub trait InventorySource {
    fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError>;

    fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError>;

    fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError>;

    fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError>;

    /// Short human description, e.g. the file being read
    fn describe(&self) -> String;
}

impl<S: InventorySource + ?Sized> InventorySource for Box<S> {
    fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
        (**self).query(query)
    }

    fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
        (**self).status_counts()
    }

    fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        (**self).mk_counts()
    }

    fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        (**self).location_counts()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Reads the snapshot file on every call
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rows(&self) -> Result<Vec<InventoryRow>, QueryError> {
        Ok(load_rows(&self.path)?)
    }
}

impl InventorySource for SnapshotSource {
    fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
        query::run(self.rows()?, query)
    }

    fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
        Ok(facets::status_counts(&self.rows()?))
    }

    fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        Ok(facets::value_counts(&self.rows()?, Column::Mk))
    }

    fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        Ok(facets::value_counts(&self.rows()?, Column::Location))
    }

    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }
}

/// SQL pushdown against one open store connection
pub struct StoreSource {
    store: InventoryStore,
}

impl StoreSource {
    pub fn new(store: InventoryStore) -> Self {
        Self { store }
    }

    /// Open the store at `path`, creating it if needed
    pub fn open(path: &Path) -> miette::Result<Self> {
        let store = InventoryStore::open(path)?;
        if store.is_empty()? {
            tracing::warn!(path = %path.display(), "store is empty; run `lagerkoll seed` first");
        }
        Ok(Self::new(store))
    }
}

impl InventorySource for StoreSource {
    fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
        self.store.query(query)
    }

    fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
        self.store.status_counts()
    }

    fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.store.mk_counts()
    }

    fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.store.location_counts()
    }

    fn describe(&self) -> String {
        match self.store.path() {
            Some(path) => format!("store {}", path.display()),
            None => "store (in memory)".to_string(),
        }
    }
}

/// Any source behind the result cache
pub struct CachedSource<S> {
    inner: S,
    pages: ResultCache<Page<InventoryRow>>,
    statuses: ResultCache<BTreeMap<String, usize>>,
    options: ResultCache<Vec<FacetOption>>,
}

impl<S: InventorySource> CachedSource<S> {
    pub fn new(inner: S, query_ttl: Duration, facet_ttl: Duration) -> Self {
        Self {
            inner,
            pages: ResultCache::new(query_ttl),
            statuses: ResultCache::new(facet_ttl),
            options: ResultCache::new(facet_ttl),
        }
    }

    /// Forget every cached page and facet list
    pub fn invalidate(&self) {
        self.pages.clear();
        self.statuses.clear();
        self.options.clear();
    }
}

impl<S: InventorySource> InventorySource for CachedSource<S> {
    fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
        let key = cache_key("inventory", query);
        self.pages.get_or_try_insert_with(&key, || self.inner.query(query))
    }

    fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
        self.statuses
            .get_or_try_insert_with("facets:status", || self.inner.status_counts())
    }

    fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.options
            .get_or_try_insert_with("facets:mk", || self.inner.mk_counts())
    }

    fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.options
            .get_or_try_insert_with("facets:location", || self.inner.location_counts())
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// Run a query, logging any failure and answering with an empty page
pub fn query_or_empty(source: &dyn InventorySource, query: &InventoryQuery) -> Page<InventoryRow> {
    match source.query(query) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(error = %e, source = %source.describe(), "inventory query failed, returning empty page");
            Page::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{FilterClause, FilterFlag, FilterValue, Operator, SortKey};
    use crate::core::snapshot::{read_snapshot, parse_document, split_rows};
    use std::cell::Cell;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "Partille": [
            {"MK": "VO", "Artikelnr": "100", "Benämning": "Oljefilter", "Status": "J", "Lagerplats": "A1",
             "CreatedAt": "2024-01-05", "UpdatedAt": "2024-03-01T10:00:00Z"},
            {"MK": "VO", "Artikelnr": "200", "Benämning": "Bromsskiva", "Status": "B",
             "UpdatedAt": "2024-02-15T08:30:00Z"},
            {"MK": "SA", "Artikelnr": "300", "Benämning": "Tändstift", "Benämning2": "Broms?"}
        ],
        "Kungälv": [
            {"MK": "VO", "Artikelnr": "100", "Status": "N", "Lagerplats": "C4"},
            {"MK": "SA", "Artikelnr": "300", "Status": "J", "UpdatedAt": 1709287200000},
            {"MK": "AU", "Artikelnr": "400"}
        ]
    }"#;

    fn sources() -> (tempfile::TempDir, SnapshotSource, StoreSource) {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lager.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let doc = parse_document(&read_snapshot(&path).unwrap(), "lager.json").unwrap();
        let mut store = InventoryStore::open_in_memory().unwrap();
        store.seed(&split_rows(&doc), "lager.json").unwrap();

        (tmp, SnapshotSource::new(path), StoreSource::new(store))
    }

    fn keys(page: &Page<InventoryRow>) -> Vec<String> {
        page.data.iter().map(|r| r.key()).collect()
    }

    fn date_clause(id: &str, operator: Operator, values: &[&str]) -> FilterClause {
        FilterClause {
            id: id.to_string(),
            value: FilterValue::Many(values.iter().map(|v| v.to_string()).collect()),
            operator: Some(operator),
            variant: None,
        }
    }

    fn advanced(clause: FilterClause) -> InventoryQuery {
        InventoryQuery {
            filter_flag: Some(FilterFlag::AdvancedFilters),
            filters: vec![clause],
            ..Default::default()
        }
    }

    fn sorted(keys: &[(&str, bool)]) -> InventoryQuery {
        InventoryQuery {
            sort: keys
                .iter()
                .map(|(id, desc)| SortKey {
                    id: id.to_string(),
                    desc: *desc,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_undated_rows_stay_undated_in_both_sources() {
        let (_tmp, snapshot, store) = sources();
        let query = advanced(date_clause("updatedAt", Operator::IsEmpty, &[]));
        let a = snapshot.query(&query).unwrap();
        let b = store.query(&query).unwrap();

        // Partille SA 300 inherits the Kungälv article's UpdatedAt
        assert_eq!(keys(&a), vec!["VO::100::Kungälv", "AU::400::Kungälv"]);
        assert_eq!(keys(&a), keys(&b));
        for (x, y) in a.data.iter().zip(&b.data) {
            assert_eq!(x.updated_at, None);
            assert_eq!(y.updated_at, None);
            assert_eq!(x.created_at, y.created_at);
        }
    }

    #[test]
    fn test_snapshot_and_store_agree() {
        let (_tmp, snapshot, store) = sources();
        let queries = vec![
            InventoryQuery::default(),
            InventoryQuery {
                q: Some("broms".to_string()),
                ..Default::default()
            },
            InventoryQuery {
                status: vec!["J".to_string()],
                sort: vec![SortKey {
                    id: "location".to_string(),
                    desc: true,
                }],
                ..Default::default()
            },
            InventoryQuery {
                per_page: 2,
                page: 2,
                sort: vec![
                    SortKey {
                        id: "mk".to_string(),
                        desc: false,
                    },
                    SortKey {
                        id: "lagerplats".to_string(),
                        desc: true,
                    },
                ],
                ..Default::default()
            },
            InventoryQuery {
                filter_flag: Some(FilterFlag::AdvancedFilters),
                filters: vec![FilterClause {
                    id: "status".to_string(),
                    value: FilterValue::Many(vec!["J".to_string()]),
                    operator: Some(Operator::NotInArray),
                    variant: None,
                }],
                ..Default::default()
            },
            advanced(date_clause("updatedAt", Operator::IsEmpty, &[])),
            advanced(date_clause("createdAt", Operator::IsNotEmpty, &[])),
            advanced(date_clause("updatedAt", Operator::IsBetween, &["2024-02-01", "2024-03-01"])),
            advanced(date_clause("updatedAt", Operator::Gt, &["2024-02-20"])),
            advanced(date_clause("updatedAt", Operator::Ne, &["2024-03-01"])),
            sorted(&[("updatedAt", true)]),
            sorted(&[("createdAt", false), ("artikelnr", false)]),
            // unknown ids sort by createdAt
            sorted(&[("pris", true)]),
        ];

        for query in &queries {
            let a = snapshot.query(query).unwrap();
            let b = store.query(query).unwrap();
            assert_eq!(keys(&a), keys(&b), "query {:?}", query);
            assert_eq!(a.total, b.total);
            assert_eq!(a.page_count, b.page_count);
        }

        assert_eq!(snapshot.status_counts().unwrap(), store.status_counts().unwrap());
        assert_eq!(snapshot.mk_counts().unwrap(), store.mk_counts().unwrap());
        assert_eq!(
            snapshot.location_counts().unwrap(),
            store.location_counts().unwrap()
        );
    }

    struct Counting {
        calls: Cell<usize>,
    }

    impl InventorySource for Counting {
        fn query(&self, _: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Page::empty())
        }
        fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
            self.calls.set(self.calls.get() + 1);
            Ok(BTreeMap::new())
        }
        fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
            Ok(vec![FacetOption::new("VO".to_string(), 1)])
        }
        fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
            Ok(vec![FacetOption::new("Partille".to_string(), 2)])
        }
        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_cached_source_reuses_results() {
        let cached = CachedSource::new(
            Counting { calls: Cell::new(0) },
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let query = InventoryQuery::default();
        cached.query(&query).unwrap();
        cached.query(&query).unwrap();
        assert_eq!(cached.inner.calls.get(), 1);

        let other = InventoryQuery {
            page: 2,
            ..Default::default()
        };
        cached.query(&other).unwrap();
        assert_eq!(cached.inner.calls.get(), 2);

        cached.status_counts().unwrap();
        cached.status_counts().unwrap();
        assert_eq!(cached.inner.calls.get(), 3);

        // separate keys for the two option facets
        assert_eq!(cached.mk_counts().unwrap()[0].value, "VO");
        assert_eq!(cached.location_counts().unwrap()[0].value, "Partille");

        cached.invalidate();
        cached.query(&query).unwrap();
        assert_eq!(cached.inner.calls.get(), 4);
    }

    #[test]
    fn test_cached_source_expires() {
        let cached = CachedSource::new(
            Counting { calls: Cell::new(0) },
            Duration::ZERO,
            Duration::ZERO,
        );
        let query = InventoryQuery::default();
        cached.query(&query).unwrap();
        cached.query(&query).unwrap();
        assert_eq!(cached.inner.calls.get(), 2);
    }

    #[test]
    fn test_query_or_empty_swallows_errors() {
        let missing = SnapshotSource::new("/nonexistent/lager.json");
        assert!(missing.query(&InventoryQuery::default()).is_err());
        let page = query_or_empty(&missing, &InventoryQuery::default());
        assert_eq!(page, Page::empty());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("Store".parse::<SourceKind>(), Ok(SourceKind::Store));
        assert_eq!("json".parse::<SourceKind>(), Ok(SourceKind::Snapshot));
        assert!("ftp".parse::<SourceKind>().is_err());
    }
}
