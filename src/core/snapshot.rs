//! JSON snapshot loading and normalization
//!
//! A snapshot (`lager.json`) is either a map from location to a list of items,
//! or a flat list of items that each name their location. Item keys vary
//! between exports, so every item is first rewritten to canonical keys
//! ([`sanitize`]), then split into articles and per-location stock entries
//! ([`split_rows`]).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use miette::Diagnostic;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::record::{article_key, Article, CrossReference, InventoryRow, StockEntry};

/// Canonical item keys, in the order they are written back out
pub const CANONICAL_KEYS: &[&str] = &[
    "MK",
    "Artikelnr",
    "Benämning",
    "Benämning2",
    "Status",
    "ExtraInfo",
    "Lagerplats",
    "Bild",
    "Paket",
    "Fordon",
    "AlternativArt",
    "Ersätter",
    "ErsattAv",
    "CreatedAt",
    "UpdatedAt",
];

/// Sanitized snapshot: location -> items with canonical keys only
pub type LagerDocument = BTreeMap<String, Vec<Map<String, Value>>>;

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    #[diagnostic(
        code(lagerkoll::snapshot::io),
        help("check the `snapshot` path in .lager/config.yaml or pass a file explicitly")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {name} is not valid JSON: {source}")]
    #[diagnostic(code(lagerkoll::snapshot::parse))]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected snapshot shape: {0}")]
    #[diagnostic(
        code(lagerkoll::snapshot::shape),
        help("expected an object keyed by location or an array of items")
    )]
    Shape(String),
}

/// Result of splitting a document into articles and stock entries
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub entries: Vec<StockEntry>,
    /// Items dropped because they lacked `MK`, `Artikelnr` or a location
    pub skipped: usize,
}

impl Snapshot {
    /// Left-join every stock entry with its article
    pub fn rows(&self) -> Vec<InventoryRow> {
        let by_key: HashMap<String, &Article> =
            self.articles.iter().map(|a| (a.key(), a)).collect();

        self.entries
            .iter()
            .map(|entry| {
                let article = by_key.get(&article_key(&entry.mk, &entry.artikelnr)).copied();
                InventoryRow::join(entry.key(), entry, article)
            })
            .collect()
    }
}

/// Read a snapshot file to a string
pub fn read_snapshot(path: &Path) -> Result<String, SnapshotError> {
    fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse snapshot text and sanitize it
pub fn parse_document(content: &str, name: &str) -> Result<LagerDocument, SnapshotError> {
    let raw: Value = serde_json::from_str(content).map_err(|source| SnapshotError::Parse {
        name: name.to_string(),
        source,
    })?;
    sanitize(&raw)
}

/// Read, parse and split a snapshot file into inventory rows
pub fn load_rows(path: &Path) -> Result<Vec<InventoryRow>, SnapshotError> {
    let content = read_snapshot(path)?;
    let doc = parse_document(&content, &path.display().to_string())?;
    Ok(split_rows(&doc).rows())
}

/// Map a raw item key to its canonical spelling
///
/// Matching ignores case, underscores, spaces and the Swedish diacritics.
pub fn canonical_key(raw: &str) -> Option<&'static str> {
    let folded: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| *c != '_' && *c != ' ' && *c != '-')
        .map(|c| match c {
            'å' | 'ä' => 'a',
            'ö' => 'o',
            other => other,
        })
        .collect();

    match folded.as_str() {
        "mk" | "markeskod" => Some("MK"),
        "artikelnr" | "artikelnummer" => Some("Artikelnr"),
        "benamning" => Some("Benämning"),
        "benamning2" => Some("Benämning2"),
        "status" => Some("Status"),
        "extrainfo" => Some("ExtraInfo"),
        "lagerplats" => Some("Lagerplats"),
        "bild" => Some("Bild"),
        "paket" => Some("Paket"),
        "fordon" => Some("Fordon"),
        "alternativart" => Some("AlternativArt"),
        "ersatter" => Some("Ersätter"),
        "ersattav" => Some("ErsattAv"),
        "createdat" => Some("CreatedAt"),
        "updatedat" => Some("UpdatedAt"),
        _ => None,
    }
}

fn is_location_key(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "lager" | "location")
}

fn sanitize_item(item: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(obj) = item.as_object() {
        for (key, value) in obj {
            if let Some(canonical) = canonical_key(key) {
                // first spelling wins when an export carries two aliases
                out.entry(canonical.to_string()).or_insert_with(|| value.clone());
            }
        }
    }
    out
}

/// Rewrite a raw snapshot into the canonical location map
pub fn sanitize(raw: &Value) -> Result<LagerDocument, SnapshotError> {
    let mut doc = LagerDocument::new();

    match raw {
        Value::Object(locations) => {
            for (location, items) in locations {
                // non-array members are ignored, as the exporter sometimes adds metadata
                let Some(items) = items.as_array() else {
                    tracing::debug!(location = %location, "ignoring non-array snapshot member");
                    continue;
                };
                doc.entry(location.clone())
                    .or_default()
                    .extend(items.iter().map(sanitize_item));
            }
        }
        Value::Array(items) => {
            for item in items {
                let location = item.as_object().and_then(|obj| {
                    obj.iter()
                        .find(|(k, _)| is_location_key(k))
                        .and_then(|(_, v)| v.as_str())
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                });
                match location {
                    Some(location) => doc
                        .entry(location.to_string())
                        .or_default()
                        .push(sanitize_item(item)),
                    None => tracing::warn!("skipping snapshot item without location"),
                }
            }
        }
        other => {
            return Err(SnapshotError::Shape(format!(
                "root is {}",
                json_type_name(other)
            )))
        }
    }

    Ok(doc)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Split a sanitized document into unique articles and stock entries
///
/// The first occurrence of an article wins; for a repeated
/// `(mk, artikelnr, location)` the last occurrence wins.
pub fn split_rows(doc: &LagerDocument) -> Snapshot {
    let mut snapshot = Snapshot::default();
    let mut article_index: HashMap<String, usize> = HashMap::new();
    let mut entry_index: HashMap<String, usize> = HashMap::new();

    for (location, items) in doc {
        for item in items {
            let mk = text(item, "MK");
            let artikelnr = text(item, "Artikelnr");
            let (Some(mk), Some(artikelnr)) = (mk, artikelnr) else {
                tracing::warn!(location = %location, "skipping item missing MK or Artikelnr");
                snapshot.skipped += 1;
                continue;
            };

            let created_at = item.get("CreatedAt").and_then(timestamp_value);
            let updated_at = item.get("UpdatedAt").and_then(timestamp_value);

            let key = article_key(&mk, &artikelnr);
            if !article_index.contains_key(&key) {
                article_index.insert(key, snapshot.articles.len());
                snapshot.articles.push(Article {
                    mk: mk.clone(),
                    artikelnr: artikelnr.clone(),
                    benamning: text(item, "Benämning"),
                    benamning2: text(item, "Benämning2"),
                    extrainfo: text(item, "ExtraInfo"),
                    bild: item.get("Bild").and_then(flag),
                    paket: list(item, "Paket"),
                    fordon: list(item, "Fordon"),
                    alternativart: cross_references(item),
                    ersatter: list(item, "Ersätter"),
                    ersatt_av: list(item, "ErsattAv"),
                    created_at,
                    updated_at,
                });
            }

            let entry = StockEntry {
                location: location.clone(),
                mk,
                artikelnr,
                status: text(item, "Status"),
                lagerplats: text(item, "Lagerplats"),
                created_at,
                updated_at,
            };
            match entry_index.get(&entry.key()) {
                Some(&idx) => {
                    tracing::debug!(key = %entry.key(), "duplicate stock entry, keeping last");
                    snapshot.entries[idx] = entry;
                }
                None => {
                    entry_index.insert(entry.key(), snapshot.entries.len());
                    snapshot.entries.push(entry);
                }
            }
        }
    }

    snapshot
}

fn text(item: &Map<String, Value>, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "j" | "ja" | "y" | "yes" | "true" | "1" => Some(true),
            "n" | "nej" | "no" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn list(item: &Map<String, Value>, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn cross_references(item: &Map<String, Value>) -> Vec<CrossReference> {
    item.get("AlternativArt")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| serde_json::from_value::<CrossReference>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Parse epoch milliseconds, RFC 3339 or a plain `YYYY-MM-DD` date (UTC midnight)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ms) = s.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_key_aliases() {
        assert_eq!(canonical_key("märkeskod"), Some("MK"));
        assert_eq!(canonical_key("Artikelnummer"), Some("Artikelnr"));
        assert_eq!(canonical_key("benamning2"), Some("Benämning2"));
        assert_eq!(canonical_key("ersatt_av"), Some("ErsattAv"));
        assert_eq!(canonical_key("Pris"), None);
    }

    #[test]
    fn test_sanitize_location_map_drops_unknown_keys() {
        let raw = json!({
            "Partille": [{"MK": "VO", "Artikelnr": "1", "Pris": 100}],
            "meta": {"exported": "2024-01-01"}
        });
        let doc = sanitize(&raw).unwrap();
        assert_eq!(doc.len(), 1);
        let item = &doc["Partille"][0];
        assert!(item.contains_key("MK"));
        assert!(!item.contains_key("Pris"));
    }

    #[test]
    fn test_sanitize_flat_list_groups_by_location() {
        let raw = json!([
            {"markeskod": "VO", "artikelnummer": "1", "Lager": "Partille"},
            {"markeskod": "VO", "artikelnummer": "2", "location": "Kungälv"},
            {"markeskod": "VO", "artikelnummer": "3"}
        ]);
        let doc = sanitize(&raw).unwrap();
        assert_eq!(doc["Partille"].len(), 1);
        assert_eq!(doc["Kungälv"].len(), 1);
        assert_eq!(doc.values().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_sanitize_rejects_scalar_root() {
        let err = sanitize(&json!("nope")).unwrap_err();
        assert!(matches!(err, SnapshotError::Shape(_)));
    }

    #[test]
    fn test_split_rows_dedupes_and_skips() {
        let raw = json!({
            "Partille": [
                {"MK": "VO", "Artikelnr": 123, "Benämning": "Filter", "Status": "J"},
                {"MK": "VO", "Artikelnr": "123", "Benämning": "Annat", "Status": "B"},
                {"MK": "", "Artikelnr": "9"}
            ],
            "Kungälv": [
                {"MK": "VO", "Artikelnr": "123", "Status": "N"}
            ]
        });
        let snapshot = split_rows(&sanitize(&raw).unwrap());
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.articles.len(), 1);
        assert_eq!(snapshot.articles[0].benamning.as_deref(), Some("Filter"));
        assert_eq!(snapshot.entries.len(), 2);

        let partille = snapshot
            .entries
            .iter()
            .find(|e| e.location == "Partille")
            .unwrap();
        assert_eq!(partille.status.as_deref(), Some("B"));
    }

    #[test]
    fn test_rows_join_article_into_every_location() {
        let raw = json!({
            "Kungälv": [{"MK": "VO", "Artikelnr": "1", "Status": "J"}],
            "Partille": [{"MK": "VO", "Artikelnr": "1", "Benämning": "Remskiva", "Bild": "J",
                          "Paket": ["P1", "P2"], "Fordon": "V70, XC70",
                          "AlternativArt": [{"märkeskod": "BO", "artikelnummer": "77"}]}]
        });
        let rows = split_rows(&sanitize(&raw).unwrap()).rows();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            // BTreeMap order puts Kungälv first, so its item defines the article
            assert_eq!(row.benamning, None);
        }

        let raw = json!({
            "Partille": [{"MK": "VO", "Artikelnr": "1", "Benämning": "Remskiva", "Bild": "J",
                          "Paket": ["P1", "P2"], "Fordon": "V70, XC70",
                          "AlternativArt": [{"märkeskod": "BO", "artikelnummer": "77"}]}]
        });
        let rows = split_rows(&sanitize(&raw).unwrap()).rows();
        let row = &rows[0];
        assert_eq!(row.id, "VO::1::Partille");
        assert_eq!(row.bild, Some(true));
        assert_eq!(row.paket.len(), 2);
        assert_eq!(row.fordon, vec!["V70".to_string(), "XC70".to_string()]);
        assert_eq!(row.alternativart[0].markeskod, "BO");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let ms = parse_timestamp("1704067200000").unwrap();
        assert_eq!(ms.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        let rfc = parse_timestamp("2024-01-01T12:00:00+01:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2024-01-01T11:00:00+00:00");
        let day = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(day, ms);
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_load_rows_reports_missing_file() {
        let err = load_rows(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
