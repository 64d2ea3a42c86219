//! Core module - inventory records, queries, sources and storage

pub mod cache;
pub mod config;
pub mod facets;
pub mod project;
pub mod query;
pub mod record;
pub mod snapshot;
pub mod source;
pub mod store;

pub use cache::ResultCache;
pub use config::Config;
pub use facets::FacetOption;
pub use project::{Project, ProjectError};
pub use query::{InventoryQuery, Page, QueryError};
pub use record::{Article, InventoryRow, StatusCode, StockEntry, Tone};
pub use snapshot::{Snapshot, SnapshotError};
pub use source::{query_or_empty, CachedSource, InventorySource, SnapshotSource, SourceKind, StoreSource};
pub use store::{InventoryStore, StoreStats, SyncStats};
