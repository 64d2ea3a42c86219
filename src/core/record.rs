//! Inventory record types
//!
//! An [`Article`] is identified by `(mk, artikelnr)` and is the same at every
//! location. A [`StockEntry`] is the per-location part of a record. Queries
//! return [`InventoryRow`], the stock entry left-joined with its article.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cross reference to an equivalent part from another maker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    #[serde(rename = "märkeskod", alias = "markeskod", alias = "mk")]
    pub markeskod: String,
    #[serde(alias = "artikelnr")]
    pub artikelnummer: String,
}

/// Location-independent article data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub mk: String,
    pub artikelnr: String,
    pub benamning: Option<String>,
    pub benamning2: Option<String>,
    pub extrainfo: Option<String>,
    pub bild: Option<bool>,
    #[serde(default)]
    pub paket: Vec<String>,
    #[serde(default)]
    pub fordon: Vec<String>,
    #[serde(default)]
    pub alternativart: Vec<CrossReference>,
    #[serde(default)]
    pub ersatter: Vec<String>,
    #[serde(default)]
    pub ersatt_av: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Identity key `mk::artikelnr`
    pub fn key(&self) -> String {
        article_key(&self.mk, &self.artikelnr)
    }
}

/// Per-location stock data for an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub location: String,
    pub mk: String,
    pub artikelnr: String,
    pub status: Option<String>,
    pub lagerplats: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockEntry {
    /// Identity key `mk::artikelnr::location`
    pub fn key(&self) -> String {
        stock_key(&self.mk, &self.artikelnr, &self.location)
    }
}

pub fn article_key(mk: &str, artikelnr: &str) -> String {
    format!("{}::{}", mk, artikelnr)
}

pub fn stock_key(mk: &str, artikelnr: &str, location: &str) -> String {
    format!("{}::{}::{}", mk, artikelnr, location)
}

/// Denormalized row returned by inventory queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
    pub id: String,
    pub mk: String,
    pub artikelnr: String,
    pub location: String,
    pub status: Option<String>,
    pub lagerplats: Option<String>,
    pub benamning: Option<String>,
    pub benamning2: Option<String>,
    pub extrainfo: Option<String>,
    pub bild: Option<bool>,
    #[serde(default)]
    pub paket: Vec<String>,
    #[serde(default)]
    pub fordon: Vec<String>,
    #[serde(default)]
    pub alternativart: Vec<CrossReference>,
    #[serde(default)]
    pub ersatter: Vec<String>,
    #[serde(default)]
    pub ersatt_av: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryRow {
    /// Join a stock entry with its article (if any)
    ///
    /// Stock timestamps win over article timestamps.
    pub fn join(id: String, entry: &StockEntry, article: Option<&Article>) -> Self {
        Self {
            id,
            mk: entry.mk.clone(),
            artikelnr: entry.artikelnr.clone(),
            location: entry.location.clone(),
            status: entry.status.clone(),
            lagerplats: entry.lagerplats.clone(),
            benamning: article.and_then(|a| a.benamning.clone()),
            benamning2: article.and_then(|a| a.benamning2.clone()),
            extrainfo: article.and_then(|a| a.extrainfo.clone()),
            bild: article.and_then(|a| a.bild),
            paket: article.map(|a| a.paket.clone()).unwrap_or_default(),
            fordon: article.map(|a| a.fordon.clone()).unwrap_or_default(),
            alternativart: article.map(|a| a.alternativart.clone()).unwrap_or_default(),
            ersatter: article.map(|a| a.ersatter.clone()).unwrap_or_default(),
            ersatt_av: article.map(|a| a.ersatt_av.clone()).unwrap_or_default(),
            created_at: entry.created_at.or(article.and_then(|a| a.created_at)),
            updated_at: entry.updated_at.or(article.and_then(|a| a.updated_at)),
        }
    }

    pub fn key(&self) -> String {
        stock_key(&self.mk, &self.artikelnr, &self.location)
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Known stock status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// J - Lagervara
    InStock,
    /// U - Utgående
    Outgoing,
    /// H - Hemtagen
    Fetched,
    /// A - Avskriven
    WrittenOff,
    /// B - Beställd
    Ordered,
    /// R - Rörelseregistrerad
    MovementRegistered,
    /// N - Ej lagerförd
    NotStocked,
}

/// How a status should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

impl StatusCode {
    pub fn all() -> &'static [StatusCode] {
        &[
            StatusCode::InStock,
            StatusCode::Outgoing,
            StatusCode::Fetched,
            StatusCode::WrittenOff,
            StatusCode::Ordered,
            StatusCode::MovementRegistered,
            StatusCode::NotStocked,
        ]
    }

    pub fn code(&self) -> &'static str {
        match self {
            StatusCode::InStock => "J",
            StatusCode::Outgoing => "U",
            StatusCode::Fetched => "H",
            StatusCode::WrittenOff => "A",
            StatusCode::Ordered => "B",
            StatusCode::MovementRegistered => "R",
            StatusCode::NotStocked => "N",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::InStock => "Lagervara",
            StatusCode::Outgoing => "Utgående",
            StatusCode::Fetched => "Hemtagen",
            StatusCode::WrittenOff => "Avskriven",
            StatusCode::Ordered => "Beställd",
            StatusCode::MovementRegistered => "Rörelseregistrerad",
            StatusCode::NotStocked => "Ej lagerförd",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            StatusCode::InStock => Tone::Positive,
            StatusCode::Outgoing | StatusCode::Fetched | StatusCode::WrittenOff => Tone::Neutral,
            StatusCode::Ordered | StatusCode::MovementRegistered | StatusCode::NotStocked => {
                Tone::Negative
            }
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusCode::all()
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status code: {}", s))
    }
}
